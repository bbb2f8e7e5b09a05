//! Per-connection lifecycle: handshake, greeting, frame loop, teardown.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use epp_common::frame::{self, FrameError, ResponseWriter};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_rustls::TlsAcceptor;

use crate::context::ConnContext;
use crate::handler::{Greeting, HandleCommand};
use crate::server::Server;

/// Outcome of waiting for a message on a connection.
#[derive(Debug)]
pub(crate) enum AwaitError {
    /// The wait was interrupted by [`EppConn::stop_await_message`].
    Stopped,
    /// The composed session deadline passed before a full message
    /// arrived.
    DeadlineExceeded,
    /// The frame reader failed.
    Frame(FrameError),
}

/// Shared record for one accepted connection.
///
/// The worker task owns the socket; this record only carries what other
/// tasks need to interrupt a pending message wait without closing the
/// socket, so the worker always closes through its own teardown path.
#[derive(Debug)]
pub(crate) struct EppConn {
    /// Set while the worker is parked waiting for a size header.
    awaiting: AtomicBool,

    /// Set once the connection should stop waiting for messages. Makes
    /// every future wait fail immediately with [`AwaitError::Stopped`].
    stopped: AtomicBool,

    /// Wakes a parked wait when the stop flag is raised.
    interrupt: Notify,

    max_message_size: u32,
}

impl EppConn {
    pub(crate) fn new(max_message_size: u32) -> Self {
        Self {
            awaiting: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            interrupt: Notify::new(),
            max_message_size,
        }
    }

    /// Waits until one message is read from `src` and returns its body.
    ///
    /// The size header is awaited under `header_deadline` (the composed
    /// idle/session deadline); once a header arrives the body is read
    /// under a fresh `read_timeout` deadline.
    pub(crate) async fn await_message<S>(
        &self,
        src: &mut S,
        header_deadline: Option<Instant>,
        read_timeout: Duration,
    ) -> Result<Vec<u8>, AwaitError>
    where
        S: AsyncRead + Unpin,
    {
        // Publish the awaiting flag before checking the stop flag so
        // stop_await_message observes at least one of the two, whichever
        // way the race goes.
        self.awaiting.store(true, Ordering::SeqCst);

        if self.stopped.load(Ordering::SeqCst) {
            self.awaiting.store(false, Ordering::SeqCst);
            return Err(AwaitError::Stopped);
        }

        let header = tokio::select! {
            res = frame::read_frame_header(src, self.max_message_size) => {
                res.map_err(AwaitError::Frame)
            }
            () = self.interrupt.notified() => Err(AwaitError::Stopped),
            () = sleep_until_deadline(header_deadline) => Err(AwaitError::DeadlineExceeded),
        };

        self.awaiting.store(false, Ordering::SeqCst);

        let body_len = match header {
            Ok(len) => len,
            Err(err) => return Err(err),
        };

        let body_deadline = deadline_from_timeout(read_timeout);
        tokio::select! {
            res = frame::read_frame_body(src, body_len) => res.map_err(AwaitError::Frame),
            () = sleep_until_deadline(body_deadline) => Err(AwaitError::DeadlineExceeded),
        }
    }

    /// Interrupts a pending [`EppConn::await_message`] and makes every
    /// future call fail with [`AwaitError::Stopped`].
    ///
    /// The socket is not touched; the worker observes the interruption
    /// and closes through its normal teardown.
    pub(crate) fn stop_await_message(&self) {
        self.stopped.store(true, Ordering::SeqCst);

        if self.awaiting.load(Ordering::SeqCst) {
            // The stored permit also covers the window where the worker
            // has published the awaiting flag but not yet parked.
            self.interrupt.notify_one();
        }
    }
}

/// Runs one accepted connection to completion, then tears it down.
pub(crate) async fn serve_conn(
    server: Arc<Server>,
    acceptor: TlsAcceptor,
    handle_command: Arc<dyn HandleCommand>,
    greeting: Arc<dyn Greeting>,
    stream: TcpStream,
    peer_addr: SocketAddr,
) {
    let conn = Arc::new(EppConn::new(server.options().max_message_size));
    let conn_id = server.register_conn(Arc::clone(&conn));
    let ctx = ConnContext::new(conn_id);

    let worker = ConnWorker {
        server: &server,
        handle_command,
        greeting,
        conn,
        ctx: ctx.clone(),
        peer_addr,
    };

    // The worker owns the TLS stream; when run returns the socket is
    // closed. Teardown order matters: deregister, then the close hook,
    // then cancel the context so handlers see a closed socket.
    worker.run(acceptor, stream).await;

    server.deregister_conn(conn_id);

    if let Some(hook) = &server.options().close_conn_hook {
        hook(&ctx, peer_addr);
    }

    ctx.cancel();
}

struct ConnWorker<'s> {
    server: &'s Server,
    handle_command: Arc<dyn HandleCommand>,
    greeting: Arc<dyn Greeting>,
    conn: Arc<EppConn>,
    ctx: ConnContext,
    peer_addr: SocketAddr,
}

impl ConnWorker<'_> {
    async fn run(&self, acceptor: TlsAcceptor, stream: TcpStream) {
        let server = self.server;

        // The handshake both reads and writes, so it runs under the
        // nearer of the two per-I/O deadlines.
        let handshake_deadline = nearest_future(&[
            deadline_from_timeout(server.options().read_timeout),
            deadline_from_timeout(server.options().write_timeout),
        ]);

        let mut tls = match with_deadline(handshake_deadline, acceptor.accept(stream)).await {
            Some(Ok(tls)) => tls,
            Some(Err(err)) => {
                server.log_debug("handshake", &err);
                return;
            }
            None => {
                server.log_debug("handshake", &"deadline exceeded");
                return;
            }
        };

        if let Some(hook) = &server.options().conn_context {
            // Not logged: an error here only signals that the embedder
            // wants the connection gone.
            if hook(&self.ctx, &tls).is_err() {
                return;
            }
        }

        // One response writer per connection, reused for every message.
        let mut rw = ResponseWriter::new();

        self.greeting.greeting(self.ctx.clone(), &mut rw).await;

        if let Err(err) = self.flush(&mut rw, &mut tls).await {
            classify_flush_error(server, &err);
            return;
        }

        if rw.should_close_after_write() {
            return;
        }

        let max_deadline = deadline_from_timeout(server.options().timeout);

        loop {
            let deadline = nearest_future(&[
                max_deadline,
                deadline_from_timeout(server.options().idle_timeout),
            ]);

            let cmd = match self
                .conn
                .await_message(&mut tls, deadline, server.options().read_timeout)
                .await
            {
                Ok(cmd) => cmd,
                Err(err) => {
                    classify_await_error(server, &err, self.peer_addr);
                    return;
                }
            };

            self.handle_command
                .handle_command(self.ctx.clone(), &mut rw, &cmd)
                .await;

            if let Err(err) = self.flush(&mut rw, &mut tls).await {
                classify_flush_error(server, &err);
                return;
            }

            if rw.should_close_after_write() {
                return;
            }
        }
    }

    async fn flush<W>(&self, rw: &mut ResponseWriter, dst: &mut W) -> Result<(), FrameError>
    where
        W: AsyncWrite + Unpin,
    {
        let deadline = deadline_from_timeout(self.server.options().write_timeout);
        match with_deadline(deadline, rw.flush_to(dst)).await {
            Some(result) => result,
            None => Err(FrameError::Io(io::ErrorKind::TimedOut.into())),
        }
    }
}

/// Decides how the end of a message wait is reported. Every class is
/// connection-terminal; only the log level differs.
fn classify_await_error(server: &Server, err: &AwaitError, peer_addr: SocketAddr) {
    match err {
        // The session deadline was reached or the wait was stopped on
        // purpose. Nothing to report.
        AwaitError::DeadlineExceeded | AwaitError::Stopped => {}

        // The client closed the connection between messages.
        AwaitError::Frame(FrameError::Closed) => {}

        AwaitError::Frame(err @ FrameError::MessageSize { .. }) => {
            server.log_info(&format!("message limit exceeded from \"{peer_addr}\""), err);
        }

        AwaitError::Frame(FrameError::Io(err)) => match err.kind() {
            // The deadline surfaced through the socket instead of the
            // timer, or the peer went away.
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {}
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected => {}

            // The stream ended inside a message.
            io::ErrorKind::UnexpectedEof => server.log_info("await message", err),

            _ if is_user_canceled(err) => {
                // RFC 5246 §7.2.2: user_canceled is a warning-level
                // alert, usually followed by close_notify.
                server.log_info(
                    &format!("handshake was canceled by client \"{peer_addr}\""),
                    err,
                );
            }

            _ => server.log_error(&format!("await message from \"{peer_addr}\""), err),
        },

        AwaitError::Frame(err) => {
            server.log_error(&format!("await message from \"{peer_addr}\""), err);
        }
    }
}

/// Decides how a failed response flush is reported. Every class is
/// connection-terminal.
fn classify_flush_error(server: &Server, err: &FrameError) {
    match err {
        // The client closed the connection, as a broken pipe or a TCP
        // RST. Reset does not always surface with a structured kind
        // through the TLS layer, so match the message as a fallback.
        FrameError::Io(io_err)
            if io_err.kind() == io::ErrorKind::BrokenPipe
                || io_err.kind() == io::ErrorKind::ConnectionReset
                || io_err.to_string().contains("connection reset by peer") =>
        {
            server.log_info("flush response", err);
        }

        _ => server.log_error("flush response", err),
    }
}

/// TLS alert messages do not round-trip as structured errors, so the
/// user_canceled alert is recognized by message text.
fn is_user_canceled(err: &io::Error) -> bool {
    let message = err.to_string().to_ascii_lowercase();
    message.contains("user canceled") || message.contains("usercanceled")
}

/// Turns a configured timeout into a deadline. Zero means no deadline.
pub(crate) fn deadline_from_timeout(timeout: Duration) -> Option<Instant> {
    if timeout.is_zero() {
        None
    } else {
        Some(Instant::now() + timeout)
    }
}

/// Returns the nearest deadline that is still in the future, or `None`
/// when no candidate qualifies.
pub(crate) fn nearest_future(deadlines: &[Option<Instant>]) -> Option<Instant> {
    let now = Instant::now();
    deadlines
        .iter()
        .flatten()
        .copied()
        .filter(|deadline| *deadline > now)
        .min()
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Runs `future` under an optional deadline. `None` means the deadline
/// passed first.
async fn with_deadline<F>(deadline: Option<Instant>, future: F) -> Option<F::Output>
where
    F: std::future::Future,
{
    match deadline {
        Some(at) => tokio::time::timeout_at(at, future).await.ok(),
        None => Some(future.await),
    }
}

//! The EPP connection server: accept loop, shared state and shutdown.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tokio_rustls::rustls;
use tokio_rustls::TlsAcceptor;

use crate::connection::{serve_conn, EppConn};
use crate::context::{ConnAborted, ConnContext, ConnId};
use crate::error::ServerError;
use crate::handler::{Greeting, HandleCommand};
use crate::logger::{Logger, TracingLogger};

/// The TLS-wrapped connection handed to the connection-context hook.
pub type ServerTlsStream = tokio_rustls::server::TlsStream<TcpStream>;

/// Derives per-connection context data from the TLS connection, e.g. a
/// client identity from the peer certificate. Returning an error aborts
/// the connection silently.
pub type ConnContextFn =
    Arc<dyn Fn(&ConnContext, &ServerTlsStream) -> Result<(), ConnAborted> + Send + Sync>;

/// Runs after a connection has been torn down, with the final context
/// and the peer address.
pub type CloseConnHookFn = Arc<dyn Fn(&ConnContext, SocketAddr) + Send + Sync>;

/// Keep-alive probe period applied to every accepted socket.
const KEEP_ALIVE_PERIOD: Duration = Duration::from_secs(60);

/// Configuration for a [`Server`].
///
/// `handle_command`, `greeting` and `tls_config` are required; every
/// other field defaults to off.
pub struct ServerOptions {
    /// Handles commands for a connection. Reads the command frame and
    /// writes the response on the response writer. Required.
    pub handle_command: Option<Arc<dyn HandleCommand>>,

    /// Called once when a new connection is established; writes the
    /// greeting on the response writer. Required.
    pub greeting: Option<Arc<dyn Greeting>>,

    /// Adds metadata to a connection before the greeting is sent. All
    /// handler calls on the connection see the same context.
    pub conn_context: Option<ConnContextFn>,

    /// Runs after a connection has been closed.
    pub close_conn_hook: Option<CloseConnHookFn>,

    /// TLS configuration; each connection's acceptor holds a handle to
    /// it. Treat as immutable once the server is started.
    pub tls_config: Option<Arc<rustls::ServerConfig>>,

    /// Total time a connection can stay open. Zero means no limit.
    pub timeout: Duration,

    /// How long a connection stays open without any activity. Zero
    /// means no limit.
    pub idle_timeout: Duration,

    /// How long to wait for reads of a command body. Zero means no
    /// limit.
    pub read_timeout: Duration,

    /// How long to wait for writes on the response writer. Zero means
    /// no limit.
    pub write_timeout: Duration,

    /// Largest accepted command body in bytes. Zero means no limit.
    pub max_message_size: u32,

    /// Sink for connection-level events. `None` silences the server.
    pub logger: Option<Arc<dyn Logger>>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            handle_command: None,
            greeting: None,
            conn_context: None,
            close_conn_hook: None,
            tls_config: None,
            timeout: Duration::ZERO,
            idle_timeout: Duration::ZERO,
            read_timeout: Duration::ZERO,
            write_timeout: Duration::ZERO,
            max_message_size: 0,
            logger: Some(Arc::new(TracingLogger)),
        }
    }
}

impl fmt::Debug for ServerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerOptions")
            .field("timeout", &self.timeout)
            .field("idle_timeout", &self.idle_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .field("max_message_size", &self.max_message_size)
            .finish_non_exhaustive()
    }
}

/// An EPP server.
///
/// Build from [`ServerOptions`], wrap in an [`Arc`] and start with
/// [`Server::serve`]. In typical use `handle_command` and `greeting`
/// are both a shared [`crate::CommandMux`]:
///
/// ```no_run
/// # use std::sync::Arc;
/// # use epps::{CommandMux, Server, ServerOptions};
/// # fn tls_config() -> Arc<tokio_rustls::rustls::ServerConfig> { unimplemented!() }
/// # async fn example() -> Result<(), epps::ServerError> {
/// let mux = Arc::new(CommandMux::new());
///
/// let server = Arc::new(Server::new(ServerOptions {
///     handle_command: Some(mux.clone()),
///     greeting: Some(mux),
///     tls_config: Some(tls_config()),
///     idle_timeout: std::time::Duration::from_secs(300),
///     ..ServerOptions::default()
/// }));
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:700").await.unwrap();
/// server.serve(listener).await
/// # }
/// ```
#[derive(Debug)]
pub struct Server {
    opts: ServerOptions,

    /// Live connections, keyed by connection id.
    active: DashMap<ConnId, Arc<EppConn>>,

    /// Source of connection ids.
    next_conn_id: AtomicU64,

    /// Signalled by [`Server::close`]; observed by the accept loop.
    close_signal: Notify,
}

impl Server {
    /// Creates a server from its configuration.
    #[must_use]
    pub fn new(opts: ServerOptions) -> Self {
        Self {
            opts,
            active: DashMap::new(),
            next_conn_id: AtomicU64::new(0),
            close_signal: Notify::new(),
        }
    }

    /// The configuration the server was built with.
    #[must_use]
    pub fn options(&self) -> &ServerOptions {
        &self.opts
    }

    /// Serves connections accepted from `listener` until the listener
    /// fails or [`Server::close`] is called.
    ///
    /// Each connection runs in its own task: TLS handshake, greeting,
    /// then one command frame at a time. On shutdown every live
    /// connection is told to stop awaiting messages and `serve` waits
    /// for all connection tasks to finish before returning.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::MissingTlsConfig`] without accepting when
    /// no TLS configuration is set, [`ServerError::KeepAlive`] when an
    /// accepted socket rejects keep-alive, and [`ServerError::Accept`]
    /// on a non-transient listener failure. A close requested through
    /// [`Server::close`] is a normal shutdown and returns `Ok`.
    ///
    /// # Panics
    ///
    /// Panics when `handle_command` or `greeting` is unset. Both are
    /// startup configuration.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<(), ServerError> {
        let handle_command = self
            .opts
            .handle_command
            .clone()
            .expect("handle_command and greeting are required");
        let greeting = self
            .opts
            .greeting
            .clone()
            .expect("handle_command and greeting are required");
        let acceptor = TlsAcceptor::from(
            self.opts
                .tls_config
                .clone()
                .ok_or(ServerError::MissingTlsConfig)?,
        );

        let mut workers: JoinSet<()> = JoinSet::new();

        let result = loop {
            tokio::select! {
                () = self.close_signal.notified() => break Ok(()),
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        if let Err(err) = enable_keepalive(&stream) {
                            break Err(ServerError::KeepAlive(err));
                        }

                        workers.spawn(serve_conn(
                            Arc::clone(&self),
                            acceptor.clone(),
                            Arc::clone(&handle_command),
                            Arc::clone(&greeting),
                            stream,
                            peer_addr,
                        ));
                    }
                    Err(err) if is_transient_accept_error(&err) => continue,
                    Err(err) => break Err(ServerError::Accept(err)),
                },
            }
        };

        // Interrupt every live connection, then wait for the workers to
        // drain. The workers close their own sockets on the way out.
        for conn in self.active.iter() {
            conn.value().stop_await_message();
        }
        while workers.join_next().await.is_some() {}

        result
    }

    /// Gracefully stops the server: [`Server::serve`] stops accepting,
    /// interrupts every live connection and returns once all connection
    /// tasks have finished.
    pub fn close(&self) {
        self.close_signal.notify_one();
    }

    /// Gracefully closes one connection: its pending message wait is
    /// interrupted and the connection task closes the socket through
    /// its normal teardown. Returns `false` when the connection is not
    /// in the active set.
    pub fn close_connection(&self, id: ConnId) -> bool {
        match self.active.get(&id) {
            Some(conn) => {
                conn.stop_await_message();
                true
            }
            None => false,
        }
    }

    /// Number of currently active connections.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.active.len()
    }

    pub(crate) fn register_conn(&self, conn: Arc<EppConn>) -> ConnId {
        let id = ConnId(self.next_conn_id.fetch_add(1, Ordering::Relaxed));
        self.active.insert(id, conn);
        id
    }

    pub(crate) fn deregister_conn(&self, id: ConnId) {
        self.active.remove(&id);
    }

    pub(crate) fn log_debug(&self, prefix: &str, detail: &dyn fmt::Display) {
        if let Some(logger) = &self.opts.logger {
            logger.debug(&format!("epp: {prefix}: {detail}"));
        }
    }

    pub(crate) fn log_info(&self, prefix: &str, detail: &dyn fmt::Display) {
        if let Some(logger) = &self.opts.logger {
            logger.info(&format!("epp: {prefix}: {detail}"));
        }
    }

    pub(crate) fn log_error(&self, prefix: &str, detail: &dyn fmt::Display) {
        if let Some(logger) = &self.opts.logger {
            logger.error(&format!("epp: {prefix}: {detail}"));
        }
    }
}

/// Enables TCP keep-alive with the fixed probe period on an accepted
/// socket.
fn enable_keepalive(stream: &TcpStream) -> io::Result<()> {
    let sock = socket2::SockRef::from(stream);
    sock.set_keepalive(true)?;
    sock.set_tcp_keepalive(&socket2::TcpKeepalive::new().with_time(KEEP_ALIVE_PERIOD))
}

/// Accept errors that can be retried instead of stopping the server.
fn is_transient_accept_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
            | io::ErrorKind::Interrupted
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

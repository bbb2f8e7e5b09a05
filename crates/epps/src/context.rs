//! Per-connection context passed to handlers.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tokio::sync::Notify;

/// Opaque identifier of one accepted connection.
///
/// Obtained from [`ConnContext::conn_id`] and usable with
/// [`crate::Server::close_connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(pub(crate) u64);

/// Returned from a connection-context hook to abort the connection.
///
/// The server does not log the abort; it is a signal, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("connection aborted by embedder")]
pub struct ConnAborted;

#[derive(Debug, Default)]
struct ContextInner {
    conn_id: u64,
    cancelled: AtomicBool,
    cancel_notify: Notify,
    values: RwLock<HashMap<String, String>>,
}

/// Writable metadata and cancellation handle for one connection.
///
/// A clone of the same context is passed to the connection-context hook,
/// the greeting, every command handler and the close hook. The hook
/// typically stores client identity here (e.g. derived from the peer
/// certificate); handlers read it back. The context is cancelled after
/// the connection socket has been closed, so handlers parked on external
/// resources can observe termination via [`ConnContext::cancelled`].
#[derive(Clone, Default)]
pub struct ConnContext {
    inner: Arc<ContextInner>,
}

impl ConnContext {
    pub(crate) fn new(conn_id: ConnId) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                conn_id: conn_id.0,
                ..ContextInner::default()
            }),
        }
    }

    /// Identifier of the connection this context belongs to.
    #[must_use]
    pub fn conn_id(&self) -> ConnId {
        ConnId(self.inner.conn_id)
    }

    /// Stores a metadata value on the connection.
    pub fn set_value(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner
            .values
            .write()
            .expect("context lock poisoned")
            .insert(key.into(), value.into());
    }

    /// Reads a metadata value stored on the connection.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<String> {
        self.inner
            .values
            .read()
            .expect("context lock poisoned")
            .get(key)
            .cloned()
    }

    /// Returns `true` once the connection has been torn down.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Completes when the connection has been torn down.
    pub async fn cancelled(&self) {
        // Register before checking so a concurrent cancel cannot be missed:
        // notify_waiters wakes futures created before the call.
        let notified = self.inner.cancel_notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }

    pub(crate) fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.cancel_notify.notify_waiters();
    }
}

impl fmt::Debug for ConnContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnContext")
            .field("conn_id", &self.inner.conn_id)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

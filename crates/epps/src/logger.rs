//! Injected logging capability for the connection server.

/// Three-level logging sink used by [`crate::Server`].
///
/// The server reports connection-level events through this trait so the
/// embedder decides where they go. [`TracingLogger`] forwards to the
/// `tracing` ecosystem and is the default.
pub trait Logger: Send + Sync {
    /// Low-value diagnostics, e.g. failed TLS handshakes.
    fn debug(&self, message: &str);
    /// Expected connection-level events, e.g. message size violations.
    fn info(&self, message: &str);
    /// Unexpected I/O failures.
    fn error(&self, message: &str);
}

/// [`Logger`] that forwards to [`tracing`] events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::debug!("{message}");
    }

    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Arc, Mutex};

    use super::Logger;

    /// [`Logger`] that records every message for assertions.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct RecordingLogger {
        pub(crate) lines: Arc<Mutex<Vec<(&'static str, String)>>>,
    }

    impl Logger for RecordingLogger {
        fn debug(&self, message: &str) {
            self.lines
                .lock()
                .unwrap()
                .push(("debug", message.to_string()));
        }

        fn info(&self, message: &str) {
            self.lines
                .lock()
                .unwrap()
                .push(("info", message.to_string()));
        }

        fn error(&self, message: &str) {
            self.lines
                .lock()
                .unwrap()
                .push(("error", message.to_string()));
        }
    }
}

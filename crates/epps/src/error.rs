//! Errors surfaced by the connection server.

use std::io;

use thiserror::Error;

/// Errors that can terminate [`crate::Server::serve`].
#[derive(Debug, Error)]
pub enum ServerError {
    /// The server was started without a TLS configuration.
    #[error("missing TLS configuration")]
    MissingTlsConfig,
    /// An accepted socket rejected the TCP keep-alive settings.
    #[error("failed to enable TCP keep-alive: {0}")]
    KeepAlive(#[source] io::Error),
    /// The listener failed with a non-transient error.
    #[error("accept error: {0}")]
    Accept(#[source] io::Error),
}

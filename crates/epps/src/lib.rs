//! EPP server framework — TLS transport, RFC 5734 framing and XML
//! command dispatch.
//!
//! The server accepts TLS connections, frames messages with the RFC 5734
//! length prefix, sends a greeting and then hands one command frame at a
//! time to the embedder's handler. The [`CommandMux`] is the usual
//! handler: it parses each frame as XML and routes it to the first bound
//! path that matches. The framework knows no EPP schemas and keeps no
//! session state; it is transport and dispatch only.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod connection;
pub mod context;
pub mod error;
pub mod handler;
pub mod logger;
pub mod mux;
pub mod server;

pub use context::{ConnAborted, ConnContext, ConnId};
pub use error::ServerError;
pub use handler::{Greeting, HandleCommand};
pub use logger::{Logger, TracingLogger};
pub use mux::{CommandFunc, CommandMux};
pub use server::{CloseConnHookFn, ConnContextFn, Server, ServerOptions, ServerTlsStream};

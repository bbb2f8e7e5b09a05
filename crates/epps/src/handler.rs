//! Callback seams between the connection server and the embedder.
//!
//! The server knows nothing about EPP commands; it hands every inbound
//! frame to a [`HandleCommand`] and asks a [`Greeting`] for the first
//! message of a session. [`crate::CommandMux`] implements both, but any
//! implementation will do. Closures returning a [`BoxFuture`] get the
//! traits for free through the blanket impls.

use epp_common::frame::ResponseWriter;
use futures_util::future::BoxFuture;

use crate::context::ConnContext;

/// Handles one inbound command frame.
///
/// `cmd` is the raw frame body; the response is written on `rw` and
/// flushed by the server after the call returns.
pub trait HandleCommand: Send + Sync {
    /// Builds the response for `cmd` on `rw`.
    fn handle_command<'a>(
        &'a self,
        ctx: ConnContext,
        rw: &'a mut ResponseWriter,
        cmd: &'a [u8],
    ) -> BoxFuture<'a, ()>;
}

/// Produces the greeting sent immediately after the TLS handshake.
pub trait Greeting: Send + Sync {
    /// Writes the greeting on `rw`.
    fn greeting<'a>(&'a self, ctx: ConnContext, rw: &'a mut ResponseWriter) -> BoxFuture<'a, ()>;
}

impl<F> HandleCommand for F
where
    F: for<'a> Fn(ConnContext, &'a mut ResponseWriter, &'a [u8]) -> BoxFuture<'a, ()>
        + Send
        + Sync,
{
    fn handle_command<'a>(
        &'a self,
        ctx: ConnContext,
        rw: &'a mut ResponseWriter,
        cmd: &'a [u8],
    ) -> BoxFuture<'a, ()> {
        self(ctx, rw, cmd)
    }
}

impl<F> Greeting for F
where
    F: for<'a> Fn(ConnContext, &'a mut ResponseWriter) -> BoxFuture<'a, ()> + Send + Sync,
{
    fn greeting<'a>(&'a self, ctx: ConnContext, rw: &'a mut ResponseWriter) -> BoxFuture<'a, ()> {
        self(ctx, rw)
    }
}

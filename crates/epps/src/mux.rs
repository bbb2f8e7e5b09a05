//! XML command multiplexer.
//!
//! Parses each inbound frame as an XML document and routes it to the
//! first bound handler whose compiled path selects an element. Bindings
//! are startup configuration: a path that fails to compile is a
//! programming error and panics at bind time.

use epp_common::document::{Document, Path};
use epp_common::frame::ResponseWriter;
use epp_common::namespace::Namespace;
use epp_common::xmlpath::XmlPathBuilder;
use futures_util::future::BoxFuture;

use crate::context::ConnContext;
use crate::handler::{Greeting, HandleCommand};

/// A bound command callback.
///
/// The parsed command is in the [`Document`] (`None` for the greeting)
/// and the response is written on the [`ResponseWriter`].
pub type CommandFunc = Box<
    dyn for<'a> Fn(ConnContext, &'a mut ResponseWriter, Option<&'a Document>) -> BoxFuture<'a, ()>
        + Send
        + Sync,
>;

struct Handler {
    path: Path,
    func: CommandFunc,
}

/// Parses and routes XML commands to bound handlers.
///
/// Handlers are tried in bind order; the first whose path matches wins.
/// A frame that is not well-formed XML, or that no binding matches,
/// leaves the response empty and marks the connection to close.
#[derive(Default)]
pub struct CommandMux {
    greeting: Option<CommandFunc>,
    handlers: Vec<Handler>,
}

impl CommandMux {
    /// Creates a mux with no bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `func` to a path expression.
    ///
    /// # Panics
    ///
    /// Panics when `path` is not a valid path expression. Bindings are
    /// startup configuration, not user data.
    pub fn bind(&mut self, path: &str, func: CommandFunc) {
        let compiled = match Path::compile(path) {
            Ok(compiled) => compiled,
            Err(err) => panic!("invalid handler path {path:?}: {err}"),
        };

        self.handlers.push(Handler {
            path: compiled,
            func,
        });
    }

    /// Binds `func` to the standard EPP command shape
    /// `//command/<command>/<command>`, where the outer two steps are in
    /// the EPP base namespace and the inner one in `ns`.
    ///
    /// # Panics
    ///
    /// See [`CommandMux::bind`].
    pub fn bind_command(&mut self, command: &str, ns: &str, func: CommandFunc) {
        let epp = Namespace::IetfEpp10.as_uri();
        let path = XmlPathBuilder::new()
            .add_orphan("//command", epp)
            .add(command, epp)
            .add(command, ns)
            .build();

        self.bind(&path, func);
    }

    /// Binds the greeting handler. EPP sends a greeting on connect, so
    /// every server needs one.
    pub fn bind_greeting(&mut self, func: CommandFunc) {
        self.greeting = Some(func);
    }

    /// Invokes the bound greeting handler with no document.
    ///
    /// # Panics
    ///
    /// Panics when no greeting is bound.
    pub async fn get_greeting(&self, ctx: ConnContext, rw: &mut ResponseWriter) {
        let greeting = self.greeting.as_ref().expect("no greeting bound");
        greeting(ctx, rw, None).await;
    }

    /// Routes one command frame.
    ///
    /// The frame is parsed as an XML document and dispatched to the first
    /// binding whose path selects an element. Parse failures and unknown
    /// commands mark the connection to close without writing a body.
    pub async fn handle(&self, ctx: ConnContext, rw: &mut ResponseWriter, cmd: &[u8]) {
        let doc = match Document::parse(cmd) {
            Ok(doc) => doc,
            Err(err) => {
                tracing::info!(error = %err, "could not read command");
                rw.close_after_write();
                return;
            }
        };

        for handler in &self.handlers {
            if doc.find(&handler.path).is_some() {
                (handler.func)(ctx, rw, Some(&doc)).await;
                return;
            }
        }

        tracing::info!("unknown command");
        rw.close_after_write();
    }
}

impl HandleCommand for CommandMux {
    fn handle_command<'a>(
        &'a self,
        ctx: ConnContext,
        rw: &'a mut ResponseWriter,
        cmd: &'a [u8],
    ) -> BoxFuture<'a, ()> {
        Box::pin(self.handle(ctx, rw, cmd))
    }
}

impl Greeting for CommandMux {
    fn greeting<'a>(&'a self, ctx: ConnContext, rw: &'a mut ResponseWriter) -> BoxFuture<'a, ()> {
        Box::pin(self.get_greeting(ctx, rw))
    }
}

//! Wire-level building blocks shared across the EPP server framework.
//!
//! This crate provides:
//! - Length-prefixed message framing per RFC 5734 §4 ([`frame`])
//! - The XML document model and compiled path engine ([`document`])
//! - EPP namespace registry ([`namespace`])
//! - RFC 5730 §3 result codes ([`status`])
//! - Structured EPP protocol errors ([`error`])
//! - XML escaping and path-expression helpers ([`xml`], [`xmlpath`])

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod document;
pub mod error;
pub mod frame;
pub mod namespace;
pub mod status;
pub mod xml;
pub mod xmlpath;

pub use document::{Document, Element, Path};
pub use error::EppError;
pub use frame::{FrameError, MessageBuffer, ResponseWriter};
pub use namespace::{Namespace, Namespaces};

//! Structured EPP protocol errors.

use thiserror::Error;

use crate::status;

/// The `value` element attached to an EPP error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    /// Offending element name.
    pub element: String,
    /// Offending element value.
    pub value: String,
}

/// The `extValue` element attached to an EPP error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtValue {
    /// Offending element name.
    pub element: String,
    /// Offending element value.
    pub value: String,
    /// Namespace URI of the offending element.
    pub namespace: String,
    /// Human-readable reason for the error.
    pub reason: String,
}

/// An EPP protocol error carried in a `<response><result>` element.
///
/// The message is filled from the status catalog at construction and is
/// not altered by later attachment appends. Handlers serialize the error
/// into a response body; the framework itself never interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct EppError {
    /// RFC 5730 §3 result code.
    pub code: u16,
    /// Catalog text for `code` captured at construction.
    pub message: String,
    /// Attached `value` elements in append order.
    pub values: Vec<Value>,
    /// Attached `extValue` elements in append order.
    pub ext_values: Vec<ExtValue>,
}

impl EppError {
    /// Creates an error for `code` with the catalog message.
    #[must_use]
    pub fn new(code: u16) -> Self {
        Self {
            code,
            message: status::text(code).to_string(),
            values: Vec::new(),
            ext_values: Vec::new(),
        }
    }

    /// Appends `value` data to the error.
    #[must_use]
    pub fn with_values<I>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        self.values.extend(values);
        self
    }

    /// Appends `extValue` data to the error.
    #[must_use]
    pub fn with_ext_values<I>(mut self, ext_values: I) -> Self
    where
        I: IntoIterator<Item = ExtValue>,
    {
        self.ext_values.extend(ext_values);
        self
    }
}

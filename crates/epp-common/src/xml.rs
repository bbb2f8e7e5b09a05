//! Small XML text helpers.

use std::fmt;

use thiserror::Error;

/// A string that is XML-escaped when displayed.
///
/// Wrap untrusted text with this before interpolating it into a response
/// body.
///
/// # Examples
///
/// ```
/// use epp_common::xml::XmlString;
/// assert_eq!(XmlString("&").to_string(), "&amp;");
/// assert_eq!(XmlString("hello").to_string(), "hello");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XmlString<'a>(pub &'a str);

impl fmt::Display for XmlString<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&quick_xml::escape::escape(self.0))
    }
}

/// The value was not a lexical `xsd:boolean`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value: {0}")]
pub struct ParseXmlBoolError(pub String);

/// Parses an XML value according to the XML Schema Part 2: Datatypes
/// 3.2.2 boolean specification.
///
/// Note: does not apply the full replace and collapse whitespace
/// constraints, only surrounding-whitespace trimming.
///
/// # Errors
///
/// Returns [`ParseXmlBoolError`] for anything other than `0`, `1`, `true`
/// or `false`.
pub fn parse_xml_bool(value: &str) -> Result<bool, ParseXmlBoolError> {
    match value.trim() {
        "0" | "false" => Ok(false),
        "1" | "true" => Ok(true),
        other => Err(ParseXmlBoolError(other.to_string())),
    }
}

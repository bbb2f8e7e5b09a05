//! Composition of XML path expressions with namespace predicates.

/// Accumulates an XML path expression step by step.
///
/// Steps can carry a `namespace-uri()` predicate so the resulting path
/// only matches elements in the given namespace.
///
/// # Examples
///
/// ```
/// use epp_common::xmlpath::XmlPathBuilder;
///
/// let path = XmlPathBuilder::new()
///     .add_orphan("//command", "urn:ietf:params:xml:ns:epp-1.0")
///     .add("login", "urn:ietf:params:xml:ns:epp-1.0")
///     .build();
/// assert_eq!(
///     path,
///     "//command[namespace-uri()='urn:ietf:params:xml:ns:epp-1.0']\
///      /login[namespace-uri()='urn:ietf:params:xml:ns:epp-1.0']"
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlPathBuilder(String);

impl XmlPathBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a step to the path. A `/` is prepended to `tag` when absent.
    /// A non-empty `namespace` decorates the step with a
    /// `namespace-uri()` predicate.
    #[must_use]
    pub fn add(mut self, tag: &str, namespace: &str) -> Self {
        if !tag.starts_with('/') {
            self.0.push('/');
        }
        self.push_step(tag, namespace);
        self
    }

    /// Adds an orphaned step: no `/` is prepended, so the caller supplies
    /// any `//` or blank prefix.
    #[must_use]
    pub fn add_orphan(mut self, tag: &str, namespace: &str) -> Self {
        self.push_step(tag, namespace);
        self
    }

    /// Returns the accumulated path expression.
    #[must_use]
    pub fn build(self) -> String {
        self.0
    }

    fn push_step(&mut self, tag: &str, namespace: &str) {
        self.0.push_str(tag);
        if !namespace.is_empty() {
            self.0.push_str("[namespace-uri()='");
            self.0.push_str(namespace);
            self.0.push_str("']");
        }
    }
}

impl std::fmt::Display for XmlPathBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

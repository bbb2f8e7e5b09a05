//! Registry of supported EPP XML namespaces.

use std::fmt;

/// A supported EPP namespace.
///
/// Unregistered URIs map to [`Namespace::Unknown`], which stringifies to
/// the empty string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Namespace not known to this registry.
    #[default]
    Unknown,
    /// `urn:ietf:params:xml:ns:epp-1.0`
    IetfEpp10,
    /// `http://www.w3.org/2001/XMLSchema-instance`
    W3Xsi,
    /// `urn:ietf:params:xml:ns:host-1.0`
    IetfHost10,
    /// `urn:ietf:params:xml:ns:contact-1.0`
    IetfContact10,
    /// `urn:ietf:params:xml:ns:domain-1.0`
    IetfDomain10,
    /// `urn:ietf:params:xml:ns:secDNS-1.0`
    IetfSecDns10,
    /// `urn:ietf:params:xml:ns:secDNS-1.1`
    IetfSecDns11,
    /// `urn:se:iis:xml:epp:iis-1.2`
    IisEpp12,
    /// `urn:se:iis:xml:epp:registryLock-1.0`
    IisRegistryLock10,
}

/// Every registered namespace, paired with its canonical URI.
const REGISTERED: [(Namespace, &str); 9] = [
    (Namespace::IetfEpp10, "urn:ietf:params:xml:ns:epp-1.0"),
    (Namespace::W3Xsi, "http://www.w3.org/2001/XMLSchema-instance"),
    (Namespace::IetfHost10, "urn:ietf:params:xml:ns:host-1.0"),
    (Namespace::IetfContact10, "urn:ietf:params:xml:ns:contact-1.0"),
    (Namespace::IetfDomain10, "urn:ietf:params:xml:ns:domain-1.0"),
    (Namespace::IetfSecDns10, "urn:ietf:params:xml:ns:secDNS-1.0"),
    (Namespace::IetfSecDns11, "urn:ietf:params:xml:ns:secDNS-1.1"),
    (Namespace::IisEpp12, "urn:se:iis:xml:epp:iis-1.2"),
    (
        Namespace::IisRegistryLock10,
        "urn:se:iis:xml:epp:registryLock-1.0",
    ),
];

impl Namespace {
    /// Returns the namespace registered for `uri`, or [`Namespace::Unknown`].
    #[must_use]
    pub fn from_uri(uri: &str) -> Self {
        REGISTERED
            .iter()
            .find(|(_, u)| *u == uri)
            .map_or(Self::Unknown, |(ns, _)| *ns)
    }

    /// Returns the canonical URI, or the empty string for
    /// [`Namespace::Unknown`].
    #[must_use]
    pub fn as_uri(self) -> &'static str {
        REGISTERED
            .iter()
            .find(|(ns, _)| *ns == self)
            .map_or("", |(_, uri)| *uri)
    }

    /// Returns `true` when the namespace identifies a provisionable object
    /// class (host, contact, domain).
    #[must_use]
    pub fn is_object(self) -> bool {
        matches!(
            self,
            Self::IetfHost10 | Self::IetfContact10 | Self::IetfDomain10
        )
    }

    /// Returns `true` when the namespace augments a base command
    /// (secDNS and vendor extensions).
    #[must_use]
    pub fn is_extension(self) -> bool {
        matches!(
            self,
            Self::IetfSecDns10 | Self::IetfSecDns11 | Self::IisEpp12 | Self::IisRegistryLock10
        )
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_uri())
    }
}

/// An ordered list of namespaces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespaces(Vec<Namespace>);

impl Namespaces {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when `wanted` is in the list.
    #[must_use]
    pub fn has(&self, wanted: Namespace) -> bool {
        self.0.iter().any(|ns| *ns == wanted)
    }

    /// Appends a namespace to the list.
    pub fn push(&mut self, ns: Namespace) {
        self.0.push(ns);
    }

    /// Iterates the namespaces in order.
    pub fn iter(&self) -> impl Iterator<Item = Namespace> + '_ {
        self.0.iter().copied()
    }
}

impl From<Vec<Namespace>> for Namespaces {
    fn from(list: Vec<Namespace>) -> Self {
        Self(list)
    }
}

impl FromIterator<Namespace> for Namespaces {
    fn from_iter<I: IntoIterator<Item = Namespace>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

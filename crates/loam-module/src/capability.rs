//! Declared capabilities.
//!
//! A capability is the provider half of the resolution contract: a
//! namespace plus typed attributes (matched by requirement filters)
//! plus directives (consumed by the resolver, most importantly
//! `uses`).

use loam_types::{AttrValue, Attrs, Version};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Directive map: string-valued, resolver-facing metadata.
pub type Directives = BTreeMap<String, String>;

/// Name of the conventional version attribute.
pub const VERSION_ATTR: &str = "version";

/// Name of the uses directive.
pub const USES_DIRECTIVE: &str = "uses";

/// A capability declared by a module's provide/export headers.
///
/// # Example
///
/// ```
/// use loam_module::Capability;
/// use loam_types::Version;
///
/// let cap = Capability::new("pkg.http")
///     .with_version(Version::new(1, 4, 0))
///     .with_directive("uses", "pkg.io,pkg.util");
///
/// assert_eq!(cap.version(), Version::new(1, 4, 0));
/// assert_eq!(cap.uses(), vec!["pkg.io", "pkg.util"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    /// Capability namespace (for package exports, the package name).
    pub namespace: String,
    /// Typed attributes; requirement filters match against these.
    pub attrs: Attrs,
    /// String directives; `uses` drives the consistency check.
    pub directives: Directives,
}

impl Capability {
    /// Creates a capability with empty attributes and directives.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            attrs: Attrs::new(),
            directives: Directives::new(),
        }
    }

    /// Sets an attribute (builder style).
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Sets the conventional `version` attribute (builder style).
    #[must_use]
    pub fn with_version(self, version: Version) -> Self {
        self.with_attr(VERSION_ATTR, AttrValue::Version(version))
    }

    /// Sets a directive (builder style).
    #[must_use]
    pub fn with_directive(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.directives.insert(key.into(), value.into());
        self
    }

    /// Returns the declared version, defaulting to `0.0.0` when the
    /// attribute is absent or not version-typed.
    #[must_use]
    pub fn version(&self) -> Version {
        self.attrs
            .get(VERSION_ATTR)
            .and_then(AttrValue::as_version)
            .cloned()
            .unwrap_or(Version::ZERO)
    }

    /// Returns the namespaces named by the `uses` directive.
    #[must_use]
    pub fn uses(&self) -> Vec<&str> {
        self.directives
            .get(USES_DIRECTIVE)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.namespace, self.version())
    }
}

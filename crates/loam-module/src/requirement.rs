//! Declared requirements.
//!
//! A requirement is the consumer half of the resolution contract: a
//! namespace, an optional attribute filter, an optional version range
//! and a cardinality. The resolver satisfies each mandatory
//! requirement with exactly one wire; optional requirements may stay
//! unwired without failing the module.

use crate::{Capability, Directives};
use loam_types::{Filter, VersionRange};
use serde::{Deserialize, Serialize};

/// Whether an unmatched requirement blocks resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// Resolution fails for the owning module if unmatched.
    #[default]
    Mandatory,
    /// Unmatched is fine; the module resolves without the wire.
    Optional,
}

impl std::fmt::Display for Cardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mandatory => f.write_str("mandatory"),
            Self::Optional => f.write_str("optional"),
        }
    }
}

/// A requirement declared by a module's require/import headers.
///
/// # Example
///
/// ```
/// use loam_module::{Capability, Requirement};
/// use loam_types::{Version, VersionRange};
///
/// let req = Requirement::new("pkg.http")
///     .with_range(VersionRange::parse("[1.0,2.0)").unwrap());
///
/// let provided = Capability::new("pkg.http").with_version(Version::new(1, 4, 0));
/// let too_new = Capability::new("pkg.http").with_version(Version::new(2, 0, 0));
///
/// assert!(req.matches(&provided));
/// assert!(!req.matches(&too_new));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    /// Namespace this requirement selects in.
    pub namespace: String,
    /// Optional predicate over the capability's attributes.
    pub filter: Option<Filter>,
    /// Optional constraint on the capability's `version` attribute.
    pub version_range: Option<VersionRange>,
    /// Mandatory or optional.
    pub cardinality: Cardinality,
    /// String directives (everything beyond `resolution`, kept for
    /// diagnostics).
    pub directives: Directives,
}

impl Requirement {
    /// Creates a mandatory requirement with no filter or range.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            filter: None,
            version_range: None,
            cardinality: Cardinality::Mandatory,
            directives: Directives::new(),
        }
    }

    /// Sets the attribute filter (builder style).
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Sets the version range (builder style).
    #[must_use]
    pub fn with_range(mut self, range: VersionRange) -> Self {
        self.version_range = Some(range);
        self
    }

    /// Marks the requirement optional (builder style).
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.cardinality = Cardinality::Optional;
        self
    }

    /// Returns `true` for mandatory cardinality.
    #[must_use]
    pub fn is_mandatory(&self) -> bool {
        self.cardinality == Cardinality::Mandatory
    }

    /// Returns `true` if `capability` satisfies this requirement:
    /// same namespace, filter matches its attributes, and its declared
    /// version lies within the range (boundary inclusivity exact).
    #[must_use]
    pub fn matches(&self, capability: &Capability) -> bool {
        if capability.namespace != self.namespace {
            return false;
        }
        if let Some(filter) = &self.filter {
            if !filter.matches(&capability.attrs) {
                return false;
            }
        }
        if let Some(range) = &self.version_range {
            if !range.includes(&capability.version()) {
                return false;
            }
        }
        true
    }
}

impl std::fmt::Display for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.namespace)?;
        if let Some(range) = &self.version_range {
            write!(f, "@{range}")?;
        }
        if self.cardinality == Cardinality::Optional {
            write!(f, " (optional)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_types::{AttrValue, Version};

    #[test]
    fn namespace_must_match() {
        let req = Requirement::new("pkg.a");
        assert!(req.matches(&Capability::new("pkg.a")));
        assert!(!req.matches(&Capability::new("pkg.b")));
    }

    #[test]
    fn range_boundaries_honoured() {
        let req = Requirement::new("pkg").with_range(VersionRange::parse("[1.0,2.0)").unwrap());
        let at_floor = Capability::new("pkg").with_version(Version::new(1, 0, 0));
        let near_ceiling = Capability::new("pkg").with_version(Version::parse("1.9.9").unwrap());
        let at_ceiling = Capability::new("pkg").with_version(Version::new(2, 0, 0));
        assert!(req.matches(&at_floor));
        assert!(req.matches(&near_ceiling));
        assert!(!req.matches(&at_ceiling));
    }

    #[test]
    fn missing_version_attr_is_zero() {
        let req = Requirement::new("pkg").with_range(VersionRange::parse("[1.0,2.0)").unwrap());
        // Unversioned capability counts as 0.0.0, outside [1.0,2.0).
        assert!(!req.matches(&Capability::new("pkg")));

        let any = Requirement::new("pkg").with_range(VersionRange::any());
        assert!(any.matches(&Capability::new("pkg")));
    }

    #[test]
    fn filter_gates_attributes() {
        let req = Requirement::new("svc")
            .with_filter(Filter::parse("(vendor=loam)").unwrap());
        let ours = Capability::new("svc").with_attr("vendor", AttrValue::from("loam"));
        let theirs = Capability::new("svc").with_attr("vendor", AttrValue::from("acme"));
        assert!(req.matches(&ours));
        assert!(!req.matches(&theirs));
    }

    #[test]
    fn optional_builder() {
        let req = Requirement::new("pkg").optional();
        assert!(!req.is_mandatory());
        assert_eq!(req.to_string(), "pkg (optional)");
    }

    #[test]
    fn display_with_range() {
        let req = Requirement::new("pkg").with_range(VersionRange::parse("[1.0,2.0)").unwrap());
        assert_eq!(req.to_string(), "pkg@[1.0.0,2.0.0)");
    }
}

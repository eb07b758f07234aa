//! The parsed, immutable module descriptor.

use crate::{Capability, Manifest, ModuleError, Requirement, HEADER_ACTIVATOR};
use loam_types::Version;
use serde::{Deserialize, Serialize};

/// Immutable view of a module's declared identity and contracts.
///
/// Built once from manifest text at install/update time; the running
/// module never mutates it. An update replaces the whole descriptor.
///
/// # Example
///
/// ```
/// use loam_module::ModuleDescriptor;
///
/// let text = "\
/// Module-SymbolicName: org.loam.sample
/// Module-Version: 1.2.0
/// Export-Package: pkg.sample;version:=\"1.2\"
/// ";
/// let desc = ModuleDescriptor::parse(text).unwrap();
/// assert_eq!(desc.symbolic_name, "org.loam.sample");
/// assert_eq!(desc.capabilities.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// Declared symbolic name.
    pub symbolic_name: String,
    /// Declared version.
    pub version: Version,
    /// Registered activator factory name; `None` means inert (no-op
    /// activation).
    pub activator: Option<String>,
    /// Everything the module provides.
    pub capabilities: Vec<Capability>,
    /// Everything the module requires.
    pub requirements: Vec<Requirement>,
}

impl ModuleDescriptor {
    /// Parses manifest text into a descriptor.
    ///
    /// Install is atomic around this: any error here means no
    /// `ModuleId` is assigned and no content is stored.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError`] on malformed headers, clauses, versions
    /// or filters.
    pub fn parse(text: &str) -> Result<Self, ModuleError> {
        let manifest = Manifest::parse(text)?;
        Ok(Self {
            symbolic_name: manifest.symbolic_name()?.to_string(),
            version: manifest.version()?,
            activator: manifest.get(HEADER_ACTIVATOR).map(str::to_string),
            capabilities: manifest.capabilities()?,
            requirements: manifest.requirements()?,
        })
    }

    /// Returns the capabilities in `namespace`.
    #[must_use]
    pub fn capabilities_in(&self, namespace: &str) -> Vec<&Capability> {
        self.capabilities
            .iter()
            .filter(|c| c.namespace == namespace)
            .collect()
    }

    /// Returns `true` if the module declares no requirements at all.
    #[must_use]
    pub fn is_self_contained(&self) -> bool {
        self.requirements.is_empty()
    }
}

impl std::fmt::Display for ModuleDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.symbolic_name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_types::VersionRange;

    #[test]
    fn parse_minimal() {
        let desc = ModuleDescriptor::parse("Module-SymbolicName: a.b\n").unwrap();
        assert_eq!(desc.symbolic_name, "a.b");
        assert_eq!(desc.version, Version::ZERO);
        assert!(desc.activator.is_none());
        assert!(desc.is_self_contained());
    }

    #[test]
    fn parse_full() {
        let text = "\
Module-SymbolicName: org.loam.http
Module-Version: 1.4.0
Module-Activator: http-server
Export-Package: pkg.http;version:=\"1.4\"
Import-Package: pkg.io;version:=\"[1.0,2.0)\"
";
        let desc = ModuleDescriptor::parse(text).unwrap();
        assert_eq!(desc.activator.as_deref(), Some("http-server"));
        assert_eq!(desc.capabilities.len(), 1);
        assert_eq!(desc.requirements.len(), 1);
        assert_eq!(
            desc.requirements[0].version_range,
            Some(VersionRange::parse("[1.0,2.0)").unwrap())
        );
        assert_eq!(desc.to_string(), "org.loam.http@1.4.0");
    }

    #[test]
    fn missing_name_fails_atomically() {
        assert!(ModuleDescriptor::parse("Module-Version: 1.0\n").is_err());
    }

    #[test]
    fn capabilities_in_namespace() {
        let text = "\
Module-SymbolicName: a
Export-Package: pkg.x;version:=\"1.0\", pkg.y;version:=\"1.0\", pkg.x;version:=\"2.0\"
";
        let desc = ModuleDescriptor::parse(text).unwrap();
        assert_eq!(desc.capabilities_in("pkg.x").len(), 2);
        assert_eq!(desc.capabilities_in("pkg.y").len(), 1);
        assert_eq!(desc.capabilities_in("pkg.z").len(), 0);
    }
}

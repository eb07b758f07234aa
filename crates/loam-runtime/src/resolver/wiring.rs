//! Wires and wirings.
//!
//! A [`Wire`] is one resolved requirement→capability edge; a
//! [`Wiring`] is the full edge set for one module, created by the
//! resolver and immutable from then on. The [`WiringTable`] maps
//! numeric module ids to their current wiring behind a copy-on-write
//! `Arc` — replacement on refresh is a single pointer swap, so a
//! re-entrant reader observes either the old or the new wiring,
//! never a partially torn one.

use loam_module::{Capability, Requirement};
use loam_types::ModuleId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// One resolved requirement→capability edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wire {
    /// The requiring module.
    pub requirer: ModuleId,
    /// The providing module.
    pub provider: ModuleId,
    /// The requirement that was satisfied.
    pub requirement: Requirement,
    /// The capability that satisfied it.
    pub capability: Capability,
}

impl std::fmt::Display for Wire {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} --[{}]--> {}",
            self.requirer, self.capability.namespace, self.provider
        )
    }
}

/// The resolved edge set of one module.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Wiring {
    /// Wires where this module is the requirer.
    pub wires: Vec<Wire>,
}

impl Wiring {
    /// Creates a wiring from its wires.
    #[must_use]
    pub fn new(wires: Vec<Wire>) -> Self {
        Self { wires }
    }

    /// Returns the provider wired for `namespace`, if any.
    #[must_use]
    pub fn provider_of(&self, namespace: &str) -> Option<&ModuleId> {
        self.wires
            .iter()
            .find(|w| w.capability.namespace == namespace)
            .map(|w| &w.provider)
    }

    /// Number of wires.
    #[must_use]
    pub fn len(&self) -> usize {
        self.wires.len()
    }

    /// Whether the module resolved without any wires.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.wires.is_empty()
    }
}

/// Copy-on-write table of module wirings, keyed by numeric id.
#[derive(Debug, Clone, Default)]
pub struct WiringTable {
    inner: Arc<RwLock<HashMap<u64, Arc<Wiring>>>>,
}

impl WiringTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a module's current wiring.
    #[must_use]
    pub fn get(&self, module: u64) -> Option<Arc<Wiring>> {
        self.inner.read().get(&module).cloned()
    }

    /// Publishes a module's wiring (single pointer swap).
    pub fn publish(&self, module: u64, wiring: Wiring) {
        self.inner.write().insert(module, Arc::new(wiring));
    }

    /// Drops a module's wiring (uninstall / refresh).
    pub fn drop_wiring(&self, module: u64) {
        self.inner.write().remove(&module);
    }

    /// Returns `true` if the module currently has a wiring.
    #[must_use]
    pub fn contains(&self, module: u64) -> bool {
        self.inner.read().contains_key(&module)
    }

    /// Snapshot of every wire in the table.
    #[must_use]
    pub fn all_wires(&self) -> Vec<Wire> {
        self.inner
            .read()
            .values()
            .flat_map(|w| w.wires.iter().cloned())
            .collect()
    }

    /// Numeric ids of modules whose wiring points at `provider`
    /// (direct dependents, the reverse edges used by refresh).
    #[must_use]
    pub fn dependents_of(&self, provider: u64) -> Vec<u64> {
        self.inner
            .read()
            .iter()
            .filter(|(requirer, wiring)| {
                **requirer != provider && wiring.wires.iter().any(|w| w.provider.id == provider)
            })
            .map(|(requirer, _)| *requirer)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_types::Version;

    fn mid(id: u64, name: &str) -> ModuleId {
        ModuleId::new(id, name, Version::new(1, 0, 0), format!("mem:{name}"))
    }

    fn wire(requirer: u64, provider: u64, ns: &str) -> Wire {
        Wire {
            requirer: mid(requirer, "r"),
            provider: mid(provider, "p"),
            requirement: Requirement::new(ns),
            capability: Capability::new(ns),
        }
    }

    #[test]
    fn provider_lookup() {
        let wiring = Wiring::new(vec![wire(1, 2, "pkg.a"), wire(1, 3, "pkg.b")]);
        assert_eq!(wiring.provider_of("pkg.a").unwrap().id, 2);
        assert_eq!(wiring.provider_of("pkg.b").unwrap().id, 3);
        assert!(wiring.provider_of("pkg.c").is_none());
    }

    #[test]
    fn publish_and_drop() {
        let table = WiringTable::new();
        assert!(table.get(1).is_none());

        table.publish(1, Wiring::new(vec![wire(1, 2, "pkg.a")]));
        assert!(table.contains(1));
        assert_eq!(table.get(1).unwrap().len(), 1);

        table.drop_wiring(1);
        assert!(!table.contains(1));
    }

    #[test]
    fn replacement_is_wholesale() {
        let table = WiringTable::new();
        table.publish(1, Wiring::new(vec![wire(1, 2, "pkg.a")]));
        let old = table.get(1).unwrap();

        table.publish(1, Wiring::new(vec![wire(1, 3, "pkg.a")]));
        let new = table.get(1).unwrap();

        // The old Arc still describes the old wiring; readers holding
        // it never see a mutation.
        assert_eq!(old.provider_of("pkg.a").unwrap().id, 2);
        assert_eq!(new.provider_of("pkg.a").unwrap().id, 3);
    }

    #[test]
    fn dependents_via_reverse_edges() {
        let table = WiringTable::new();
        table.publish(1, Wiring::new(vec![wire(1, 3, "pkg.a")]));
        table.publish(2, Wiring::new(vec![wire(2, 3, "pkg.a")]));
        table.publish(3, Wiring::new(vec![]));

        let mut deps = table.dependents_of(3);
        deps.sort_unstable();
        assert_eq!(deps, vec![1, 2]);
        assert!(table.dependents_of(1).is_empty());
    }
}

//! Identifier types for LOAM.
//!
//! Module and service identities are monotonic numeric ids assigned by
//! the framework at install/registration time and never reused; event
//! identifiers are UUID-based so they stay unique across processes.

use crate::Version;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of an installed module.
///
/// A `ModuleId` is stamped at install time from the descriptor plus the
/// framework's monotonic counter. The durable identity is the numeric
/// [`ModuleId::id`] together with the install location — runtime tables
/// key on the numeric id, so a module updated in place keeps its id and
/// location while the symbolic name/version are re-stamped from the new
/// descriptor.
///
/// # Example
///
/// ```
/// use loam_types::{ModuleId, Version};
///
/// let id = ModuleId::new(7, "com.example.logging", Version::new(1, 2, 0), "file:logging");
/// assert_eq!(id.id, 7);
/// assert_eq!(id.to_string(), "com.example.logging@1.2.0#7");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleId {
    /// Monotonic numeric id; unique for the lifetime of the store,
    /// never reused after uninstall.
    pub id: u64,
    /// Declared symbolic name.
    pub symbolic_name: String,
    /// Declared version.
    pub version: Version,
    /// Install location supplied by the caller (opaque to the runtime).
    pub location: String,
}

impl ModuleId {
    /// Creates a module identity.
    #[must_use]
    pub fn new(
        id: u64,
        symbolic_name: impl Into<String>,
        version: Version,
        location: impl Into<String>,
    ) -> Self {
        Self {
            id,
            symbolic_name: symbolic_name.into(),
            version,
            location: location.into(),
        }
    }

    /// Returns a copy re-stamped with a new name and version.
    ///
    /// Used by `update()`: the numeric id and location are the durable
    /// identity and are preserved.
    #[must_use]
    pub fn restamped(&self, symbolic_name: impl Into<String>, version: Version) -> Self {
        Self {
            id: self.id,
            symbolic_name: symbolic_name.into(),
            version,
            location: self.location.clone(),
        }
    }

    /// Returns `true` if both ids refer to the same installed module,
    /// ignoring name/version re-stamps from updates.
    #[must_use]
    pub fn same_module(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}#{}", self.symbolic_name, self.version, self.id)
    }
}

/// Identity of a registered service.
///
/// Assigned monotonically by the service registry; ordering by
/// `ServiceId` is registration order, which is the tie-break for equal
/// rankings (first registered wins).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ServiceId(pub u64);

impl ServiceId {
    /// Returns the inner numeric id.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

// NOTE: ServiceId intentionally does NOT implement Default. Ids are
// assigned by the registry counter; a free-standing zero id would
// collide with the first registration.

impl std::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "svc:{}", self.0)
    }
}

/// Identity of a single queued event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    /// Creates a new [`EventId`] with a random UUID v4.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "evt:{}", self.0)
    }
}

/// Identity of an event-listener subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub Uuid);

impl ListenerId {
    /// Creates a new [`ListenerId`] with a random UUID v4.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lsn:{}", self.0)
    }
}

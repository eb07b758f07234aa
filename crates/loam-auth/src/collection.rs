//! Permission collections.

use crate::Permission;
use serde::{Deserialize, Serialize};

/// An immutable set of granted permissions with an `implies` query.
///
/// # Example
///
/// ```
/// use loam_auth::{Permission, PermissionCollection};
///
/// let granted = PermissionCollection::new(vec![
///     Permission::new("module", "org.loam.*", "start,stop"),
///     Permission::new("service", "*", "get"),
/// ]);
///
/// assert!(granted.implies(&Permission::new("module", "org.loam.a", "start")));
/// assert!(!granted.implies(&Permission::new("service", "x", "register")));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionCollection {
    permissions: Vec<Permission>,
}

impl PermissionCollection {
    /// Creates a collection from concrete permissions.
    #[must_use]
    pub fn new(permissions: Vec<Permission>) -> Self {
        Self { permissions }
    }

    /// The empty collection (implies nothing).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A collection holding only [`Permission::all`].
    #[must_use]
    pub fn all() -> Self {
        Self::new(vec![Permission::all()])
    }

    /// Returns `true` if any granted permission covers `requested`.
    #[must_use]
    pub fn implies(&self, requested: &Permission) -> bool {
        self.permissions.iter().any(|p| p.implies(requested))
    }

    /// Returns the granted permissions.
    #[must_use]
    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }

    /// Number of grants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }
}

impl FromIterator<Permission> for PermissionCollection {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

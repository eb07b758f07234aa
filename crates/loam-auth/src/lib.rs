//! Permission model for the LOAM module runtime.
//!
//! Every privileged operation a module performs — starting another
//! module, touching the service registry, reaching the archive store —
//! is gated through this model:
//!
//! ```text
//! Effective Permission =
//!     PermissionCollection (resolved lazily from textual entries)
//!   ∩ ConditionalPermissions (ordered grants, immediate + postponed
//!                             conditions, first applicable wins)
//! ```
//!
//! # Lazy resolution
//!
//! Grants start life as text ([`PermissionEntry`]) and resolve into
//! concrete [`Permission`]s only when the owning module is first
//! checked; the runtime's permission domain owns that cache and its
//! once-only guard. This crate is the pure model — no locks, no
//! framework state.
//!
//! # Example
//!
//! ```
//! use loam_auth::{Permission, PermissionCollection, PermissionEntry};
//!
//! let entries = PermissionEntry::parse_lines(r#"
//! # module grants
//! module  "org.loam.*"  "start,stop"
//! service "*"           "get"
//! "#).unwrap();
//!
//! let granted: PermissionCollection =
//!     entries.iter().map(PermissionEntry::resolve).collect();
//!
//! assert!(granted.implies(&Permission::new("module", "org.loam.http", "start")));
//! assert!(!granted.implies(&Permission::new("service", "x", "register")));
//! ```

#![warn(missing_docs)]

mod collection;
mod condition;
mod conditional;
mod entry;
mod error;
mod permission;

pub use collection::PermissionCollection;
pub use condition::{Condition, ConditionState, FixedCondition};
pub use conditional::{ConditionalGrant, ConditionalPermissions, Decision};
pub use entry::PermissionEntry;
pub use error::AuthError;
pub use permission::{
    Permission, BUILTIN_KINDS, KIND_ALL, KIND_MODULE, KIND_SERVICE, KIND_STORAGE,
};

//! Lazy, cached permission enforcement.

mod domain;

pub use domain::PermissionDomain;

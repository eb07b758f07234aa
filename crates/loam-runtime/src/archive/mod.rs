//! Durable module storage: archive container + per-module store.

mod container;
mod error;
mod store;

pub use container::{ModuleArchive, PERMISSIONS_RESOURCE};
pub use error::StoreError;
pub use store::{ArchiveStore, ModuleMeta};

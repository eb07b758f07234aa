//! Ranked service registry with copy-on-write reference lists.

mod registry;

pub use registry::{ServiceEntry, ServiceRegistration, ServiceRegistry, RANKING_PROP};

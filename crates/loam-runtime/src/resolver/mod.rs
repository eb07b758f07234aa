//! Capability resolution: wiring types and the resolver.

#[allow(clippy::module_inception)]
mod resolver;
mod error;
mod wiring;

pub use error::ResolveError;
pub use resolver::{ResolutionOutcome, Resolver, ResolverSnapshot, SnapshotModule};
pub use wiring::{Wire, Wiring, WiringTable};

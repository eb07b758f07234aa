//! LOAM runtime — the host side of the module system.
//!
//! This crate composes the four core subsystems behind the
//! [`Framework`] API:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Module SDK Layer                         │
//! │  loam-types · loam-event · loam-module · loam-auth          │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Runtime Layer (THIS CRATE)                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  archive/     : ModuleArchive, ArchiveStore                 │
//! │  resolver/    : Resolver, Wire, Wiring, WiringTable         │
//! │  lifecycle/   : ModuleHandle, NamespaceView                 │
//! │  permissions/ : PermissionDomain                            │
//! │  events/      : EventQueue                                  │
//! │  registry/    : ServiceRegistry                             │
//! │  framework/   : Framework, FrameworkContext, RuntimeError   │
//! │  config/      : LoamConfig, ConfigLoader                    │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Frontend Layer                           │
//! │  loam-cli                                                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Concurrency model
//!
//! Multiple caller tasks may drive the framework concurrently. Each
//! module serializes its own transitions behind its handle's async
//! mutex; the resolver takes a short global lock only around the
//! snapshot and the wiring publication; the service registry's
//! reference list and the event queue's subscriber list are
//! copy-on-write; permission resolution is a once-only guard per
//! module. Event delivery runs on the queue's own worker task, which
//! detaches after an idle timeout and re-attaches on demand.

#![warn(missing_docs)]

mod archive;
pub mod config;
mod events;
mod framework;
mod lifecycle;
mod permissions;
mod registry;
mod resolver;

pub use archive::{ArchiveStore, ModuleArchive, ModuleMeta, StoreError, PERMISSIONS_RESOURCE};
pub use config::{ConfigError, ConfigLoader, LoamConfig};
pub use events::EventQueue;
pub use framework::{Framework, FrameworkContext, RuntimeError};
pub use lifecycle::{ModuleHandle, NamespaceView, RuntimeModuleContext};
pub use permissions::PermissionDomain;
pub use registry::{ServiceEntry, ServiceRegistration, ServiceRegistry, RANKING_PROP};
pub use resolver::{
    ResolutionOutcome, ResolveError, Resolver, ResolverSnapshot, SnapshotModule, Wire, Wiring,
    WiringTable,
};

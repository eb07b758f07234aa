//! Core types for the LOAM module runtime.
//!
//! LOAM (Lifecycle-Orchestrated Attachable Modules) is a dynamic module
//! runtime: modules are installed, version-resolved, isolated, started
//! and stopped at run time without restarting the host process. This
//! crate is the leaf of the workspace — every other crate depends on it
//! and it depends on nothing but serde/uuid.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Module SDK Layer                        │
//! │  (stable surface for module authors)                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  loam-types   : ids, Version, VersionRange, Filter  ◄── HERE │
//! │  loam-event   : Event, EventListener                        │
//! │  loam-module  : descriptor model, ModuleActivator           │
//! │  loam-auth    : Permission, Condition, grants               │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Runtime Layer                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  loam-runtime : store, resolver, lifecycle, framework       │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Frontend Layer                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  loam-cli     : command-line interface                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # What lives here
//!
//! - [`ModuleId`] / [`ServiceId`] / [`EventId`] / [`ListenerId`]:
//!   identity types. Module and service ids are monotonic numbers
//!   assigned by the framework and never reused.
//! - [`Version`] and [`VersionRange`]: dotted-triplet-plus-qualifier
//!   versions and ranges with exact boundary-inclusivity semantics.
//! - [`AttrValue`] / [`Attrs`]: typed, ordered attribute maps carried
//!   by capabilities, services and events.
//! - [`Filter`]: the attribute predicate language shared by
//!   requirement matching, service queries and listener subscriptions.
//! - [`ErrorCode`]: the workspace-wide error classification trait.

#![warn(missing_docs)]

mod attrs;
mod error;
mod filter;
mod id;
mod range;
mod version;

pub use attrs::{AttrValue, Attrs};
pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use filter::{CompareOp, Filter, FilterError};
pub use id::{EventId, ListenerId, ModuleId, ServiceId};
pub use range::VersionRange;
pub use version::{Version, VersionError};

//! Module descriptor model and activation contract for LOAM.
//!
//! A *module* is an installable, versioned unit of code. This crate
//! defines everything a module declares about itself and the contract
//! the runtime calls into — it holds no runtime state of its own.
//!
//! # Pieces
//!
//! | Type | Role |
//! |------|------|
//! | [`ModuleDescriptor`] | Parsed, immutable declaration (name, version, contracts) |
//! | [`Capability`] | What the module provides |
//! | [`Requirement`] | What the module needs, with filter/range/cardinality |
//! | [`ModuleState`] | The lifecycle state machine's states |
//! | [`ModuleActivator`] | The start/stop entry points |
//! | [`ModuleContext`] | The activator's wiring-scoped view of the world |
//!
//! # Descriptor text
//!
//! ```
//! use loam_module::ModuleDescriptor;
//!
//! let desc = ModuleDescriptor::parse("\
//! Module-SymbolicName: org.loam.http
//! Module-Version: 1.4.0
//! Export-Package: pkg.http;version:=\"1.4\";uses:=\"pkg.io\"
//! Import-Package: pkg.io;version:=\"[1.0,2.0)\"
//! ").unwrap();
//!
//! assert_eq!(desc.capabilities[0].uses(), vec!["pkg.io"]);
//! ```

#![warn(missing_docs)]

mod activator;
mod capability;
mod descriptor;
mod error;
mod manifest;
mod requirement;
mod state;
pub mod testing;

pub use activator::{ActivatorFactory, InertActivator, ModuleActivator, ModuleContext};
pub use capability::{Capability, Directives, USES_DIRECTIVE, VERSION_ATTR};
pub use descriptor::ModuleDescriptor;
pub use error::ModuleError;
pub use manifest::{
    Manifest, HEADER_ACTIVATOR, HEADER_EXPORT_PACKAGE, HEADER_IMPORT_PACKAGE,
    HEADER_PROVIDE_CAPABILITY, HEADER_REQUIRE_CAPABILITY, HEADER_SYMBOLIC_NAME, HEADER_VERSION,
};
pub use requirement::{Cardinality, Requirement};
pub use state::ModuleState;

//! Runtime configuration: types, hierarchical loader, errors.
//!
//! ```no_run
//! use loam_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .with_project_root(".")
//!     .load()
//!     .expect("config");
//! ```

mod error;
mod loader;
mod types;

pub use error::ConfigError;
pub use loader::{default_config_path, ConfigLoader, PROJECT_CONFIG_FILE};
pub use types::{LoamConfig, PathsConfig, PermissionsConfig, QueueConfig, ResolverConfig};

//! Configuration types.
//!
//! All sections implement [`Default`] for compile-time fallback
//! values; every field is optional in the config file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main runtime configuration after merging all layers.
///
/// # Example
///
/// ```
/// use loam_runtime::config::LoamConfig;
///
/// let config = LoamConfig::default();
/// assert!(!config.debug);
/// assert_eq!(config.queue.capacity, 256);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoamConfig {
    /// Enable debug diagnostics.
    pub debug: bool,

    /// Path configuration.
    pub paths: PathsConfig,

    /// Event queue configuration.
    pub queue: QueueConfig,

    /// Resolver configuration.
    pub resolver: ResolverConfig,

    /// Permission configuration.
    pub permissions: PermissionsConfig,
}

impl LoamConfig {
    /// Creates a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes to TOML.
    ///
    /// # Errors
    ///
    /// Returns the serializer error on failure.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserializes from TOML.
    ///
    /// # Errors
    ///
    /// Returns the deserializer error on failure.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// Filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    /// Root directory of the archive store.
    pub storage_root: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from(".loam/store"),
        }
    }
}

/// Event queue tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    /// Bounded channel capacity.
    pub capacity: usize,
    /// Worker idle timeout before it detaches, in milliseconds.
    pub idle_timeout_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            idle_timeout_ms: 30_000,
        }
    }
}

/// Resolver tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResolverConfig {
    /// Upper bound on uses-conflict backtracking steps per module.
    pub max_backtracks: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { max_backtracks: 64 }
    }
}

/// Permission domain defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PermissionsConfig {
    /// When a module carries no grant text, allow everything (`true`)
    /// or nothing (`false`).
    pub default_allow: bool,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self { default_allow: true }
    }
}

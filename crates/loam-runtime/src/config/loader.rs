//! Configuration loader with hierarchical merging.
//!
//! # Load Order
//!
//! 1. Default values (compile-time)
//! 2. Global config (`~/.loam/config.toml`)
//! 3. Project config (`.loam/config.toml` under the project root)
//! 4. Environment variables (`LOAM_*`)
//!
//! Each layer overrides the previous. Layers are merged as TOML
//! tables before the final deserialization, so a file that sets only
//! `queue.capacity` leaves every other field alone.

use super::{ConfigError, LoamConfig};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default global config path: `~/.loam/config.toml`.
#[must_use]
pub fn default_config_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(".loam")
        .join("config.toml")
}

/// Project-relative config file path.
pub const PROJECT_CONFIG_FILE: &str = ".loam/config.toml";

/// Configuration loader with builder pattern.
///
/// # Example
///
/// ```no_run
/// use loam_runtime::config::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .with_project_root("/path/to/project")
///     .skip_env_vars() // deterministic in tests
///     .load()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    global_config_path: Option<PathBuf>,
    project_root: Option<PathBuf>,
    skip_env: bool,
    skip_global: bool,
    skip_project: bool,
}

impl ConfigLoader {
    /// Creates a loader with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a custom global config path.
    #[must_use]
    pub fn with_global_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Sets the project root; project config loads from
    /// `<root>/.loam/config.toml`.
    #[must_use]
    pub fn with_project_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_root = Some(path.into());
        self
    }

    /// Skips environment variable loading (deterministic tests).
    #[must_use]
    pub fn skip_env_vars(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// Skips the global config layer.
    #[must_use]
    pub fn skip_global_config(mut self) -> Self {
        self.skip_global = true;
        self
    }

    /// Skips the project config layer.
    #[must_use]
    pub fn skip_project_config(mut self) -> Self {
        self.skip_project = true;
        self
    }

    /// Loads and merges configuration from all enabled layers.
    ///
    /// Missing files are silently ignored; files that exist but fail
    /// to parse are errors.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on unreadable/unparsable files or
    /// malformed environment variables.
    pub fn load(&self) -> Result<LoamConfig, ConfigError> {
        let mut merged = toml::Table::new();

        if !self.skip_global {
            let path = self
                .global_config_path
                .clone()
                .unwrap_or_else(default_config_path);
            if let Some(layer) = load_table(&path)? {
                debug!(path = %path.display(), "loaded global config");
                merge_tables(&mut merged, layer);
            }
        }

        if !self.skip_project {
            if let Some(root) = &self.project_root {
                let path = root.join(PROJECT_CONFIG_FILE);
                if let Some(layer) = load_table(&path)? {
                    debug!(path = %path.display(), "loaded project config");
                    merge_tables(&mut merged, layer);
                }
            }
        }

        let mut config: LoamConfig = toml::Value::Table(merged)
            .try_into()
            .map_err(|e| ConfigError::parse("<merged>", e.to_string()))?;

        if !self.skip_env {
            apply_env(&mut config)?;
        }

        Ok(config)
    }
}

fn load_table(path: &Path) -> Result<Option<toml::Table>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::read(path.display().to_string(), e.to_string()))?;
    let table: toml::Table = text
        .parse()
        .map_err(|e: toml::de::Error| ConfigError::parse(path.display().to_string(), e.to_string()))?;
    Ok(Some(table))
}

/// Deep-merges `overlay` into `base`: tables merge recursively, every
/// other value type replaces.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn apply_env(config: &mut LoamConfig) -> Result<(), ConfigError> {
    if let Ok(value) = std::env::var("LOAM_DEBUG") {
        config.debug = parse_bool("LOAM_DEBUG", &value)?;
    }
    if let Ok(value) = std::env::var("LOAM_STORAGE") {
        config.paths.storage_root = PathBuf::from(value);
    }
    if let Ok(value) = std::env::var("LOAM_QUEUE_CAPACITY") {
        config.queue.capacity = value
            .parse()
            .map_err(|_| ConfigError::env("LOAM_QUEUE_CAPACITY", "expected integer"))?;
    }
    if let Ok(value) = std::env::var("LOAM_IDLE_TIMEOUT_MS") {
        config.queue.idle_timeout_ms = value
            .parse()
            .map_err(|_| ConfigError::env("LOAM_IDLE_TIMEOUT_MS", "expected integer"))?;
    }
    if let Ok(value) = std::env::var("LOAM_DEFAULT_ALLOW") {
        config.permissions.default_allow = parse_bool("LOAM_DEFAULT_ALLOW", &value)?;
    }
    Ok(())
}

fn parse_bool(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::env(var, "expected bool")),
    }
}

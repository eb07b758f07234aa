//! Durable per-module storage.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/
//!   store.toml            counter state (next numeric id)
//!   modules/
//!     7/
//!       module.mf         manifest text
//!       meta.toml         location, start flag, start level, last-modified
//!       resources/        blobs from the archive
//! ```
//!
//! Numeric ids come from the persisted counter and are never reused,
//! even across process restarts and after uninstall purges.

use crate::{ModuleArchive, StoreError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Persisted per-module metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleMeta {
    /// Caller-supplied install location.
    pub location: String,
    /// Eager start flag: set on `start()`, cleared on `stop()`;
    /// honoured by refresh restarts and cold boot.
    pub start_flag: bool,
    /// Start level; `start_all` brings modules up in ascending level.
    pub start_level: u32,
    /// Last content modification (install or update).
    pub last_modified: DateTime<Utc>,
}

impl ModuleMeta {
    fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            start_flag: false,
            start_level: 1,
            last_modified: Utc::now(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CounterState {
    next_id: u64,
}

/// The archive store.
///
/// All operations are synchronous filesystem work guarded by a single
/// mutex — the store is a leaf consulted from short critical sections,
/// never held across activations.
#[derive(Debug)]
pub struct ArchiveStore {
    root: PathBuf,
    counter: Mutex<CounterState>,
}

impl ArchiveStore {
    /// Opens (creating if needed) a store at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the directory cannot be created or
    /// the counter state is unreadable.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(root.join("modules"))
            .map_err(|e| StoreError::io(&root, e))?;

        let counter_path = root.join("store.toml");
        let counter = if counter_path.exists() {
            let text = fs::read_to_string(&counter_path)
                .map_err(|e| StoreError::io(&counter_path, e))?;
            toml::from_str(&text)
                .map_err(|e| StoreError::Corrupt(format!("store.toml: {e}")))?
        } else {
            CounterState { next_id: 1 }
        };

        info!(root = %root.display(), next_id = counter.next_id, "archive store opened");
        Ok(Self {
            root,
            counter: Mutex::new(counter),
        })
    }

    /// Allocates the next numeric module id and persists the counter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the counter cannot be persisted; the
    /// id is not considered allocated in that case.
    pub fn allocate_id(&self) -> Result<u64, StoreError> {
        let mut counter = self.counter.lock();
        let id = counter.next_id;
        let next = CounterState { next_id: id + 1 };
        let text = toml::to_string(&next).expect("counter serializes");
        let path = self.root.join("store.toml");
        fs::write(&path, text).map_err(|e| StoreError::io(&path, e))?;
        counter.next_id = id + 1;
        Ok(id)
    }

    fn module_dir(&self, id: u64) -> PathBuf {
        self.root.join("modules").join(id.to_string())
    }

    /// Writes a module's content (manifest + resources) and metadata.
    /// Used by install and, with `preserve_meta`, by update.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on filesystem failure.
    pub fn put_content(
        &self,
        id: u64,
        location: &str,
        archive: &ModuleArchive,
    ) -> Result<(), StoreError> {
        let dir = self.module_dir(id);
        let existing_meta = self.meta(id).ok();

        fs::create_dir_all(dir.join("resources")).map_err(|e| StoreError::io(&dir, e))?;

        let manifest_path = dir.join("module.mf");
        fs::write(&manifest_path, &archive.manifest)
            .map_err(|e| StoreError::io(&manifest_path, e))?;

        for (name, bytes) in &archive.resources {
            let path = dir.join("resources").join(sanitize(name));
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
            }
            fs::write(&path, bytes).map_err(|e| StoreError::io(&path, e))?;
        }

        // Update preserves the flag and level, refreshes the stamp.
        let meta = match existing_meta {
            Some(mut meta) => {
                meta.last_modified = Utc::now();
                meta
            }
            None => ModuleMeta::new(location),
        };
        self.put_meta(id, &meta)?;

        debug!(module = id, location, "content stored");
        Ok(())
    }

    /// Reads a module's manifest text.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingModule`] when the module directory
    /// does not exist.
    pub fn read_manifest(&self, id: u64) -> Result<String, StoreError> {
        let path = self.module_dir(id).join("module.mf");
        if !path.exists() {
            return Err(StoreError::MissingModule(id));
        }
        fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))
    }

    /// Reads one stored resource blob.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when missing or unreadable.
    pub fn read_resource(&self, id: u64, name: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.module_dir(id).join("resources").join(sanitize(name));
        if !path.exists() {
            return Err(StoreError::MissingResource {
                module: id,
                name: name.to_string(),
            });
        }
        fs::read(&path).map_err(|e| StoreError::io(&path, e))
    }

    /// Reads a module's persisted metadata.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when missing or corrupt.
    pub fn meta(&self, id: u64) -> Result<ModuleMeta, StoreError> {
        let path = self.module_dir(id).join("meta.toml");
        if !path.exists() {
            return Err(StoreError::MissingModule(id));
        }
        let text = fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
        toml::from_str(&text).map_err(|e| StoreError::Corrupt(format!("meta.toml for {id}: {e}")))
    }

    /// Replaces a module's persisted metadata.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on filesystem failure.
    pub fn put_meta(&self, id: u64, meta: &ModuleMeta) -> Result<(), StoreError> {
        let path = self.module_dir(id).join("meta.toml");
        let text = toml::to_string_pretty(meta).expect("meta serializes");
        fs::write(&path, text).map_err(|e| StoreError::io(&path, e))
    }

    /// Sets the eager start flag.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on filesystem failure.
    pub fn set_start_flag(&self, id: u64, flag: bool) -> Result<(), StoreError> {
        let mut meta = self.meta(id)?;
        if meta.start_flag != flag {
            meta.start_flag = flag;
            self.put_meta(id, &meta)?;
        }
        Ok(())
    }

    /// Removes a module's content entirely (uninstall purge).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on filesystem failure; purging an absent
    /// module is a no-op.
    pub fn purge(&self, id: u64) -> Result<(), StoreError> {
        let dir = self.module_dir(id);
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
            debug!(module = id, "content purged");
        }
        Ok(())
    }

    /// Lists the numeric ids of stored modules, ascending.
    #[must_use]
    pub fn stored_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = fs::read_dir(self.root.join("modules"))
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter_map(|e| e.file_name().to_str().and_then(|s| s.parse().ok()))
                    .collect()
            })
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }
}

/// Keeps resource names inside the resources directory.
fn sanitize(name: &str) -> PathBuf {
    name.split('/')
        .filter(|seg| !seg.is_empty() && *seg != "." && *seg != "..")
        .collect()
}

impl AsRef<Path> for ArchiveStore {
    fn as_ref(&self) -> &Path {
        &self.root
    }
}

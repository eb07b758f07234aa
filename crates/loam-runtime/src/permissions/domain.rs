//! The permission domain.
//!
//! Maps a module to its granted permission set and answers `check`
//! for every privileged operation. Grants arrive as text (from the
//! module archive or an admin call) and resolve into concrete
//! [`Permission`]s only on the module's first check — modules that
//! are never exercised never pay for resolution. Once resolved, the
//! textual list is discarded; the resolution is monotonic one-way and
//! guarded so concurrent first-access callers agree on a single
//! result.
//!
//! An ordered [`ConditionalPermissions`] table is consulted first
//! when present; its decision overrides the plain collection.

use loam_auth::{
    AuthError, ConditionalPermissions, Decision, Permission, PermissionCollection,
    PermissionEntry,
};
use loam_types::ModuleId;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-module grant state: raw text until first use, then a resolved
/// collection.
struct DomainEntry {
    /// Textual entries, taken (and dropped) by the first resolution.
    raw: Mutex<Option<Vec<PermissionEntry>>>,
    /// The resolve-once cell; concurrent first checks race on this
    /// and exactly one performs the work.
    resolved: OnceCell<PermissionCollection>,
}

impl DomainEntry {
    fn new(entries: Vec<PermissionEntry>) -> Self {
        Self {
            raw: Mutex::new(Some(entries)),
            resolved: OnceCell::new(),
        }
    }
}

/// The permission domain; cheap to clone.
#[derive(Clone)]
pub struct PermissionDomain {
    inner: Arc<DomainInner>,
}

struct DomainInner {
    /// Policy for modules with no grant entry at all.
    default_allow: bool,
    entries: RwLock<HashMap<u64, Arc<DomainEntry>>>,
    conditional: RwLock<Arc<ConditionalPermissions>>,
    /// Counts textual-list resolutions (test probe for the caching
    /// contract: two sequential checks must resolve once).
    resolve_count: AtomicUsize,
}

impl PermissionDomain {
    /// Creates a domain.
    ///
    /// `default_allow` decides modules without grant text: `true`
    /// grants everything (open framework), `false` grants nothing.
    #[must_use]
    pub fn new(default_allow: bool) -> Self {
        Self {
            inner: Arc::new(DomainInner {
                default_allow,
                entries: RwLock::new(HashMap::new()),
                conditional: RwLock::new(Arc::new(ConditionalPermissions::new())),
                resolve_count: AtomicUsize::new(0),
            }),
        }
    }

    /// Installs (or administratively replaces) a module's grant text.
    /// Replacement invalidates any previously resolved collection.
    pub fn set_entries(&self, module: u64, entries: Vec<PermissionEntry>) {
        self.inner
            .entries
            .write()
            .insert(module, Arc::new(DomainEntry::new(entries)));
        debug!(module, "permission entries replaced");
    }

    /// Drops a module's grants (uninstall).
    pub fn remove_module(&self, module: u64) {
        self.inner.entries.write().remove(&module);
    }

    /// Replaces the ordered conditional-grant table.
    pub fn set_conditional(&self, table: ConditionalPermissions) {
        *self.inner.conditional.write() = Arc::new(table);
    }

    /// Number of textual-list resolutions performed so far.
    #[must_use]
    pub fn resolve_count(&self) -> usize {
        self.inner.resolve_count.load(Ordering::Relaxed)
    }

    /// Returns the module's resolved permission collection, resolving
    /// the textual entries on first use.
    #[must_use]
    pub fn granted_set(&self, module: u64) -> PermissionCollection {
        let entry = self.inner.entries.read().get(&module).cloned();
        match entry {
            None => {
                if self.inner.default_allow {
                    PermissionCollection::all()
                } else {
                    PermissionCollection::empty()
                }
            }
            Some(entry) => entry
                .resolved
                .get_or_init(|| {
                    self.inner.resolve_count.fetch_add(1, Ordering::Relaxed);
                    let raw = entry.raw.lock().take().unwrap_or_default();
                    resolve_entries(module, &raw)
                })
                .clone(),
        }
    }

    /// Checks whether `module` holds `permission`.
    ///
    /// The conditional table is consulted first; when it has no
    /// opinion the resolved collection decides.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RecursiveCondition`] on the fatal
    /// postponed-condition configuration error; that is never mapped
    /// to a silent deny.
    pub fn check(&self, module: &ModuleId, permission: &Permission) -> Result<bool, AuthError> {
        let conditional = Arc::clone(&self.inner.conditional.read());
        if !conditional.is_empty() {
            if let Some(decision) = conditional.decide(permission)? {
                return Ok(decision == Decision::Allow);
            }
        }
        Ok(self.granted_set(module.id).implies(permission))
    }
}

/// Resolves textual entries; unknown kinds are kept (they imply
/// nothing the runtime enforces) but logged once here.
fn resolve_entries(module: u64, entries: &[PermissionEntry]) -> PermissionCollection {
    entries
        .iter()
        .map(|entry| {
            let permission = entry.resolve();
            if !permission.is_builtin_kind() {
                warn!(
                    module,
                    kind = %permission.kind,
                    "unknown permission kind in grant text"
                );
            }
            permission
        })
        .collect()
}

//! The shared framework context.
//!
//! One [`FrameworkContext`] value composes every subsystem and is
//! passed explicitly to the code that needs it — there is no ambient
//! "current framework" global anywhere in the workspace. All
//! module-to-anything links inside it are numeric-id lookups into
//! owning tables, so teardown is a table removal rather than a graph
//! walk.

use crate::{
    ArchiveStore, EventQueue, LoamConfig, ModuleHandle, PermissionDomain, ResolutionOutcome,
    Resolver, ResolverSnapshot, RuntimeError, ServiceRegistry, SnapshotModule, WiringTable,
};
use loam_event::{Event, LifecycleTopic};
use loam_module::{ActivatorFactory, InertActivator, ModuleActivator, ModuleDescriptor};
use loam_types::{ModuleId, Version};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Everything the runtime's components share.
pub struct FrameworkContext {
    /// Effective configuration.
    pub config: LoamConfig,
    /// Durable module content and metadata.
    pub store: ArchiveStore,
    /// Asynchronous event fan-out.
    pub queue: EventQueue,
    /// The service registry.
    pub registry: ServiceRegistry,
    /// Permission enforcement.
    pub domain: PermissionDomain,
    /// Published wirings, keyed by numeric module id.
    pub wirings: WiringTable,

    resolver: Resolver,
    modules: RwLock<HashMap<u64, Arc<ModuleHandle>>>,
    activators: RwLock<HashMap<String, ActivatorFactory>>,
    /// Short-lived global resolver lock: covers the candidate-set
    /// snapshot and the wiring publication, not the matching itself.
    resolve_lock: tokio::sync::Mutex<()>,
}

impl FrameworkContext {
    /// Composes the context from its parts.
    #[must_use]
    pub fn new(
        config: LoamConfig,
        store: ArchiveStore,
        queue: EventQueue,
        registry: ServiceRegistry,
        domain: PermissionDomain,
    ) -> Self {
        let resolver = Resolver::new(config.resolver.max_backtracks);
        Self {
            config,
            store,
            queue,
            registry,
            domain,
            wirings: WiringTable::new(),
            resolver,
            modules: RwLock::new(HashMap::new()),
            activators: RwLock::new(HashMap::new()),
            resolve_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// The framework's own identity (numeric id 0, reserved — module
    /// ids start at 1). Source of framework-level events.
    #[must_use]
    pub fn framework_ident(&self) -> ModuleId {
        ModuleId::new(
            0,
            "loam.framework",
            Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or(Version::ZERO),
            "loam:framework",
        )
    }

    // ── module table ─────────────────────────────────────────

    /// Looks a module up by numeric id.
    #[must_use]
    pub fn module(&self, id: u64) -> Option<Arc<ModuleHandle>> {
        self.modules.read().get(&id).cloned()
    }

    /// Looks a module up by install location.
    #[must_use]
    pub fn module_at(&self, location: &str) -> Option<Arc<ModuleHandle>> {
        self.modules
            .read()
            .values()
            .find(|h| h.ident().location == location)
            .cloned()
    }

    /// Snapshot of all module handles.
    #[must_use]
    pub fn module_handles(&self) -> Vec<Arc<ModuleHandle>> {
        let mut handles: Vec<Arc<ModuleHandle>> = self.modules.read().values().cloned().collect();
        handles.sort_by_key(|h| h.numeric());
        handles
    }

    pub(crate) fn insert_module(&self, handle: Arc<ModuleHandle>) {
        self.modules.write().insert(handle.numeric(), handle);
    }

    pub(crate) fn remove_module(&self, id: u64) {
        self.modules.write().remove(&id);
    }

    // ── activator registry ───────────────────────────────────

    /// Registers an activator factory under the name descriptors refer
    /// to via `Module-Activator`.
    pub fn register_activator(&self, name: impl Into<String>, factory: ActivatorFactory) {
        self.activators.write().insert(name.into(), factory);
    }

    /// Builds the activator instance for a descriptor: the named
    /// factory, or an inert activator when no header is present.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::UnknownActivator`] when the named
    /// factory was never registered.
    pub fn build_activator(
        &self,
        descriptor: &ModuleDescriptor,
    ) -> Result<Box<dyn ModuleActivator>, RuntimeError> {
        match &descriptor.activator {
            None => Ok(Box::new(InertActivator)),
            Some(name) => {
                let factory = self
                    .activators
                    .read()
                    .get(name)
                    .cloned()
                    .ok_or_else(|| RuntimeError::UnknownActivator(name.clone()))?;
                Ok(factory())
            }
        }
    }

    // ── resolution ───────────────────────────────────────────

    /// Resolves `candidates`: snapshots under the global resolver
    /// lock, runs the lock-free matcher, publishes new wirings, flips
    /// states and posts events. Per-module failures live in the
    /// returned outcome, they are never a call-level error.
    ///
    /// # Errors
    ///
    /// Currently infallible beyond the type; kept fallible for the
    /// public surface's stability.
    pub async fn resolve_candidates(
        &self,
        ids: &[u64],
    ) -> Result<ResolutionOutcome, RuntimeError> {
        let _guard = self.resolve_lock.lock().await;

        let snapshot = ResolverSnapshot {
            modules: self
                .module_handles()
                .into_iter()
                .map(|h| SnapshotModule {
                    id: h.ident(),
                    resolved: h.state().is_resolved(),
                    descriptor: h.descriptor(),
                })
                .collect(),
            existing_wires: self.wirings.all_wires(),
        };
        let candidates: BTreeSet<u64> = ids.iter().copied().collect();
        let outcome = self.resolver.resolve(&snapshot, &candidates);

        for (&id, wiring) in &outcome.wirings {
            self.wirings.publish(id, wiring.clone());
            if let Some(handle) = self.module(id) {
                handle.mark_resolved();
                self.queue
                    .post(Event::lifecycle(LifecycleTopic::Resolved, handle.ident()))
                    .await;
            }
        }
        for (&id, error) in &outcome.failures {
            if let Some(handle) = self.module(id) {
                self.queue
                    .post(
                        Event::lifecycle(LifecycleTopic::ResolutionFailed, handle.ident())
                            .with_cause(error.to_string()),
                    )
                    .await;
            }
        }

        debug!(
            resolved = outcome.wirings.len(),
            failed = outcome.failures.len(),
            wires = outcome.wire_count(),
            "resolution pass complete"
        );
        Ok(outcome)
    }

    /// Numeric ids of modules without a published wiring.
    #[must_use]
    pub fn unresolved_ids(&self) -> Vec<u64> {
        self.module_handles()
            .iter()
            .filter(|h| !h.state().is_resolved() && !h.state().is_terminal())
            .map(|h| h.numeric())
            .collect()
    }
}

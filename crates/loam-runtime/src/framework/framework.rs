//! The framework coordinator.
//!
//! [`Framework`] composes the archive store, resolver, lifecycle
//! engine, permission domain, event queue and service registry behind
//! the public install/start/stop/update/uninstall/refresh API.
//!
//! ```no_run
//! use loam_runtime::{Framework, LoamConfig, ModuleArchive};
//!
//! # async fn demo() -> Result<(), loam_runtime::RuntimeError> {
//! let framework = Framework::new(LoamConfig::default())?;
//!
//! let archive = ModuleArchive::from_manifest("\
//! Module-SymbolicName: org.loam.sample
//! Module-Version: 1.0.0
//! ");
//! let id = framework.install("file:sample", &archive.to_bytes()).await?;
//! framework.start(id.id).await?;
//! framework.stop(id.id).await?;
//! framework.uninstall(id.id).await?;
//! # Ok(())
//! # }
//! ```

use crate::{
    ArchiveStore, EventQueue, FrameworkContext, LoamConfig, ModuleArchive, ModuleHandle,
    PermissionDomain, RuntimeError, ServiceRegistry, Wiring, PERMISSIONS_RESOURCE,
};
use loam_auth::PermissionEntry;
use loam_event::{
    Event, EventKind, EventListener, FrameworkTopic, LifecycleTopic, ListenerFilter, ServiceTopic,
};
use loam_module::{ActivatorFactory, ModuleDescriptor, ModuleError, ModuleState};
use loam_types::{ListenerId, ModuleId};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// The top-level runtime object.
pub struct Framework {
    ctx: Arc<FrameworkContext>,
    /// Serializes installs (location dedup) and refreshes.
    admin_lock: tokio::sync::Mutex<()>,
}

impl Framework {
    /// Builds a framework from configuration: opens the store, wires
    /// the queue, registry and permission domain together.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Store`] when the storage root cannot be
    /// opened.
    pub fn new(config: LoamConfig) -> Result<Self, RuntimeError> {
        let store = ArchiveStore::open(&config.paths.storage_root)?;
        let queue = EventQueue::new(
            config.queue.capacity,
            Duration::from_millis(config.queue.idle_timeout_ms),
        );
        let registry = ServiceRegistry::new(queue.clone());
        let domain = PermissionDomain::new(config.permissions.default_allow);

        let ctx = Arc::new(FrameworkContext::new(
            config, store, queue, registry, domain,
        ));
        info!("framework constructed");
        Ok(Self {
            ctx,
            admin_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// The shared context (for embedding and tests).
    #[must_use]
    pub fn context(&self) -> &Arc<FrameworkContext> {
        &self.ctx
    }

    /// The service registry.
    #[must_use]
    pub fn registry(&self) -> &ServiceRegistry {
        &self.ctx.registry
    }

    /// Registers an activator factory by name.
    pub fn register_activator(&self, name: impl Into<String>, factory: ActivatorFactory) {
        self.ctx.register_activator(name, factory);
    }

    // ── lifecycle API ────────────────────────────────────────

    /// Installs a module from a content stream.
    ///
    /// Installing an already-present location returns the existing
    /// identity. The descriptor (and any permission resource) is
    /// validated before any state is touched — a malformed archive
    /// retains no partial `ModuleId`.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Store`] on a bad container,
    /// [`RuntimeError::Module`]/[`RuntimeError::Auth`] on malformed
    /// descriptor or grant text.
    pub async fn install(&self, location: &str, content: &[u8]) -> Result<ModuleId, RuntimeError> {
        let _admin = self.admin_lock.lock().await;

        if let Some(existing) = self.ctx.module_at(location) {
            return Ok(existing.ident());
        }

        // Validate everything before allocating an identity.
        let archive = ModuleArchive::parse(content)?;
        let descriptor = Arc::new(ModuleDescriptor::parse(&archive.manifest)?);
        let entries = match archive.resource(PERMISSIONS_RESOURCE) {
            Some(bytes) => {
                let text = std::str::from_utf8(bytes).map_err(|_| {
                    ModuleError::InvalidDescriptor("permissions resource is not UTF-8".into())
                })?;
                Some(PermissionEntry::parse_lines(text)?)
            }
            None => None,
        };

        let numeric = self.ctx.store.allocate_id()?;
        self.ctx.store.put_content(numeric, location, &archive)?;

        let ident = ModuleId::new(
            numeric,
            &descriptor.symbolic_name,
            descriptor.version.clone(),
            location,
        );
        if let Some(entries) = entries {
            self.ctx.domain.set_entries(numeric, entries);
        }
        self.ctx
            .insert_module(Arc::new(ModuleHandle::new(ident.clone(), descriptor)));

        info!(module = %ident, "installed");
        self.ctx
            .queue
            .post(Event::lifecycle(LifecycleTopic::Installed, ident.clone()))
            .await;
        Ok(ident)
    }

    /// Starts a module by numeric id.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::UnknownModule`] or whatever the transition
    /// produced.
    pub async fn start(&self, id: u64) -> Result<(), RuntimeError> {
        self.handle(id)?.start(&self.ctx).await
    }

    /// Stops a module by numeric id.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::UnknownModule`] or whatever the transition
    /// produced.
    pub async fn stop(&self, id: u64) -> Result<(), RuntimeError> {
        self.handle(id)?.stop(&self.ctx).await
    }

    /// Replaces a module's content in place.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::UnknownModule`], container/descriptor errors,
    /// or the restart failure when the module was active.
    pub async fn update(&self, id: u64, content: &[u8]) -> Result<(), RuntimeError> {
        let archive = ModuleArchive::parse(content)?;
        self.handle(id)?.update(&self.ctx, archive).await
    }

    /// Uninstalls a module.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::UnknownModule`] or an illegal-transition error
    /// from ACTIVE/transient states.
    pub async fn uninstall(&self, id: u64) -> Result<(), RuntimeError> {
        let handle = self.handle(id)?;
        handle.uninstall(&self.ctx).await?;
        self.ctx.remove_module(id);
        Ok(())
    }

    /// Resolves every unresolved module. Per-module failures are
    /// reported through events, not as a call failure.
    ///
    /// # Errors
    ///
    /// Only infrastructure errors; unresolvable modules are not one.
    pub async fn resolve_all(&self) -> Result<(), RuntimeError> {
        let ids = self.ctx.unresolved_ids();
        self.ctx.resolve_candidates(&ids).await?;
        Ok(())
    }

    /// Refreshes a module set (`None` = every module): stops them
    /// dependents-first, drops their wirings, re-resolves, restarts
    /// the previously-eager ones, and posts a `Refreshed` framework
    /// event.
    ///
    /// Safe to call from a listener callback: delivery runs on the
    /// queue worker after the originating transition released its
    /// locks, so this call contends like any other caller.
    ///
    /// # Errors
    ///
    /// Infrastructure errors only; per-module stop/start failures are
    /// contained and reported through events.
    pub async fn refresh_modules(&self, ids: Option<&[u64]>) -> Result<(), RuntimeError> {
        let _admin = self.admin_lock.lock().await;

        // Closure over reverse wiring edges: refreshing a provider
        // drags its transitive dependents in.
        let mut set: BTreeSet<u64> = match ids {
            Some(ids) => ids.iter().copied().collect(),
            None => self.ctx.module_handles().iter().map(|h| h.numeric()).collect(),
        };
        let mut work: Vec<u64> = set.iter().copied().collect();
        while let Some(id) = work.pop() {
            for dependent in self.ctx.wirings.dependents_of(id) {
                if set.insert(dependent) {
                    work.push(dependent);
                }
            }
        }

        // Eager flags before stopping (stop clears them).
        let eager: BTreeSet<u64> = set
            .iter()
            .copied()
            .filter(|id| {
                self.ctx
                    .store
                    .meta(*id)
                    .map(|m| m.start_flag)
                    .unwrap_or(false)
            })
            .collect();

        let order = self.dependents_first(&set);
        for &id in &order {
            if let Some(handle) = self.ctx.module(id) {
                if let Err(err) = handle.stop(&self.ctx).await {
                    warn!(module = id, error = %err, "stop during refresh reported failure");
                }
            }
        }

        for &id in &set {
            self.ctx.wirings.drop_wiring(id);
            if let Some(handle) = self.ctx.module(id) {
                handle.mark_unresolved();
            }
        }

        let candidates: Vec<u64> = set.iter().copied().collect();
        self.ctx.resolve_candidates(&candidates).await?;

        // Providers first on the way back up.
        for &id in order.iter().rev() {
            if !eager.contains(&id) {
                continue;
            }
            if let Some(handle) = self.ctx.module(id) {
                if let Err(err) = handle.start(&self.ctx).await {
                    warn!(module = id, error = %err, "restart during refresh failed");
                }
            }
        }

        self.ctx
            .queue
            .post(Event::framework(
                FrameworkTopic::Refreshed,
                self.ctx.framework_ident(),
            ))
            .await;
        Ok(())
    }

    /// Starts every module whose persisted start flag is set, in
    /// ascending start level (numeric id within a level). Failures
    /// are contained per module.
    ///
    /// # Errors
    ///
    /// Infrastructure errors only.
    pub async fn start_all(&self) -> Result<(), RuntimeError> {
        let mut eager: Vec<(u32, u64)> = Vec::new();
        for handle in self.ctx.module_handles() {
            if let Ok(meta) = self.ctx.store.meta(handle.numeric()) {
                if meta.start_flag {
                    eager.push((meta.start_level, handle.numeric()));
                }
            }
        }
        eager.sort_unstable();

        for (_, id) in eager {
            if let Some(handle) = self.ctx.module(id) {
                if let Err(err) = handle.start(&self.ctx).await {
                    warn!(module = id, error = %err, "eager start failed");
                }
            }
        }
        self.ctx
            .queue
            .post(Event::framework(
                FrameworkTopic::Started,
                self.ctx.framework_ident(),
            ))
            .await;
        Ok(())
    }

    /// Reloads previously-installed modules from the store on a cold
    /// boot. Returns how many came back. No install events are fired
    /// for restored modules.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Store`]/[`RuntimeError::Module`] when stored
    /// content is unreadable — surfacing corruption beats silently
    /// skipping modules.
    pub async fn restore(&self) -> Result<usize, RuntimeError> {
        let _admin = self.admin_lock.lock().await;
        let mut restored = 0;
        for id in self.ctx.store.stored_ids() {
            if self.ctx.module(id).is_some() {
                continue;
            }
            let manifest = self.ctx.store.read_manifest(id)?;
            let descriptor = Arc::new(ModuleDescriptor::parse(&manifest)?);
            let meta = self.ctx.store.meta(id)?;
            if let Ok(bytes) = self.ctx.store.read_resource(id, PERMISSIONS_RESOURCE) {
                if let Ok(text) = std::str::from_utf8(&bytes) {
                    self.ctx
                        .domain
                        .set_entries(id, PermissionEntry::parse_lines(text)?);
                }
            }
            let ident = ModuleId::new(
                id,
                &descriptor.symbolic_name,
                descriptor.version.clone(),
                &meta.location,
            );
            self.ctx
                .insert_module(Arc::new(ModuleHandle::new(ident, descriptor)));
            restored += 1;
        }
        if restored > 0 {
            info!(restored, "modules restored from store");
        }
        Ok(restored)
    }

    /// Stops every active module (dependents first) and flushes the
    /// event queue.
    pub async fn shutdown(&self) {
        let all: BTreeSet<u64> = self.ctx.module_handles().iter().map(|h| h.numeric()).collect();
        for id in self.dependents_first(&all) {
            if let Some(handle) = self.ctx.module(id) {
                if handle.state() == ModuleState::Active {
                    if let Err(err) = handle.stop(&self.ctx).await {
                        warn!(module = id, error = %err, "stop during shutdown failed");
                    }
                }
            }
        }
        self.ctx.queue.flush().await;
        info!("framework shut down");
    }

    // ── introspection ────────────────────────────────────────

    /// Identities of all installed modules, ascending numeric id.
    #[must_use]
    pub fn module_ids(&self) -> Vec<ModuleId> {
        self.ctx.module_handles().iter().map(|h| h.ident()).collect()
    }

    /// A module's current state.
    #[must_use]
    pub fn state_of(&self, id: u64) -> Option<ModuleState> {
        self.ctx.module(id).map(|h| h.state())
    }

    /// A module's current wiring.
    #[must_use]
    pub fn wiring_of(&self, id: u64) -> Option<Arc<Wiring>> {
        self.ctx.wirings.get(id)
    }

    // ── event API ────────────────────────────────────────────

    /// Subscribes a listener. A service-kind subscription is
    /// back-filled with synthetic `Registered` events for every
    /// already-present service (targeted at this listener only),
    /// serialized against live registrations so the snapshot has no
    /// race window.
    pub async fn add_listener(
        &self,
        filter: ListenerFilter,
        listener: Arc<dyn EventListener>,
    ) -> ListenerId {
        if filter.kind != EventKind::Service {
            return self.ctx.queue.subscribe(filter, listener);
        }

        let _order = self.ctx.registry.order_lock().await;
        let id = self.ctx.queue.subscribe(filter, listener);
        for entry in self.ctx.registry.all_references() {
            self.ctx
                .queue
                .post_to(
                    id,
                    Event::service(
                        ServiceTopic::Registered,
                        entry.owner.clone(),
                        entry.id,
                        &entry.interfaces,
                    ),
                )
                .await;
        }
        id
    }

    /// Removes a subscription.
    pub fn remove_listener(&self, id: ListenerId) {
        self.ctx.queue.unsubscribe(id);
    }

    // ── internals ────────────────────────────────────────────

    fn handle(&self, id: u64) -> Result<Arc<ModuleHandle>, RuntimeError> {
        self.ctx.module(id).ok_or(RuntimeError::UnknownModule(id))
    }

    /// Orders a module set dependents-first using the reverse wiring
    /// edges; cycles fall back to ascending numeric id.
    fn dependents_first(&self, set: &BTreeSet<u64>) -> Vec<u64> {
        let mut remaining = set.clone();
        let mut order = Vec::with_capacity(set.len());
        while !remaining.is_empty() {
            let free: Vec<u64> = remaining
                .iter()
                .copied()
                .filter(|id| {
                    self.ctx
                        .wirings
                        .dependents_of(*id)
                        .iter()
                        .all(|d| !remaining.contains(d))
                })
                .collect();
            if free.is_empty() {
                // Wiring cycle: take the lowest id to make progress.
                let id = *remaining.iter().next().expect("non-empty");
                order.push(id);
                remaining.remove(&id);
            } else {
                for id in free {
                    order.push(id);
                    remaining.remove(&id);
                }
            }
        }
        order
    }
}

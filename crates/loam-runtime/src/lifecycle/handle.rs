//! The per-module lifecycle engine.
//!
//! Each installed module is one [`ModuleHandle`]. Transitions are
//! serialized by the handle's own async mutex — concurrent `start`,
//! `stop` and `update` calls on the same module queue up behind the
//! in-flight transition, while operations on different modules
//! proceed independently. State is published through a read lock so
//! observers (and the resolver snapshot) read it without touching the
//! transition lock.
//!
//! Every mutating operation that fails leaves the module at a
//! well-defined rest state — there is no half-STARTING limbo: the
//! transition lock is only released with the module at rest
//! (Installed, Resolved, Active or Uninstalled).

use crate::{FrameworkContext, ModuleArchive, RuntimeError, RuntimeModuleContext, PERMISSIONS_RESOURCE};
use loam_auth::{Permission, PermissionEntry, KIND_MODULE};
use loam_event::{Event, FrameworkTopic, LifecycleTopic};
use loam_module::{ModuleActivator, ModuleDescriptor, ModuleError, ModuleState};
use loam_types::ModuleId;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

/// Holds the live activator instance between start and stop.
#[derive(Default)]
pub(crate) struct ActivatorSlot {
    activator: Option<Box<dyn ModuleActivator>>,
}

/// One installed module.
pub struct ModuleHandle {
    numeric: u64,
    ident: RwLock<ModuleId>,
    state: RwLock<ModuleState>,
    descriptor: RwLock<Arc<ModuleDescriptor>>,
    transition: Mutex<ActivatorSlot>,
}

impl ModuleHandle {
    /// Creates a handle in the INSTALLED state.
    #[must_use]
    pub fn new(ident: ModuleId, descriptor: Arc<ModuleDescriptor>) -> Self {
        Self {
            numeric: ident.id,
            ident: RwLock::new(ident),
            state: RwLock::new(ModuleState::Installed),
            descriptor: RwLock::new(descriptor),
            transition: Mutex::new(ActivatorSlot::default()),
        }
    }

    /// The never-changing numeric id.
    #[must_use]
    pub fn numeric(&self) -> u64 {
        self.numeric
    }

    /// Current identity (re-stamped by update).
    #[must_use]
    pub fn ident(&self) -> ModuleId {
        self.ident.read().clone()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ModuleState {
        *self.state.read()
    }

    /// Current descriptor.
    #[must_use]
    pub fn descriptor(&self) -> Arc<ModuleDescriptor> {
        Arc::clone(&self.descriptor.read())
    }

    fn set_state(&self, state: ModuleState) {
        *self.state.write() = state;
    }

    /// Marks the module RESOLVED after its wiring was published.
    /// No-op unless currently INSTALLED.
    pub(crate) fn mark_resolved(&self) {
        let mut state = self.state.write();
        if *state == ModuleState::Installed {
            *state = ModuleState::Resolved;
        }
    }

    /// Drops back to INSTALLED after its wiring was dropped (refresh).
    /// No-op unless currently RESOLVED.
    pub(crate) fn mark_unresolved(&self) {
        let mut state = self.state.write();
        if *state == ModuleState::Resolved {
            *state = ModuleState::Installed;
        }
    }

    /// Starts the module. Idempotent when already ACTIVE.
    ///
    /// Ensures RESOLVED (triggering resolution from INSTALLED), checks
    /// the start permission, then STARTING → activator → ACTIVE. An
    /// activator failure unwinds to RESOLVED and is both returned and
    /// reported as a framework error event.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Resolve`], [`RuntimeError::PermissionDenied`],
    /// [`RuntimeError::UnknownActivator`],
    /// [`RuntimeError::ActivationFailed`], or an illegal-transition
    /// [`RuntimeError::Module`] on an uninstalled module.
    pub async fn start(self: &Arc<Self>, ctx: &FrameworkContext) -> Result<(), RuntimeError> {
        let mut slot = self.transition.lock().await;
        self.start_locked(ctx, &mut slot).await
    }

    pub(crate) async fn start_locked(
        self: &Arc<Self>,
        ctx: &FrameworkContext,
        slot: &mut MutexGuard<'_, ActivatorSlot>,
    ) -> Result<(), RuntimeError> {
        match self.state() {
            ModuleState::Active => return Ok(()),
            ModuleState::Uninstalled | ModuleState::Starting | ModuleState::Stopping => {
                return Err(ModuleError::illegal(self.state(), "start").into());
            }
            ModuleState::Installed => {
                // Resolve the whole unresolved set: this module's
                // providers may themselves be unresolved candidates.
                let outcome = ctx.resolve_candidates(&ctx.unresolved_ids()).await?;
                if let Some(err) = outcome.failures.get(&self.numeric) {
                    return Err(err.clone().into());
                }
                debug_assert!(self.state().is_resolved());
            }
            ModuleState::Resolved => {}
        }

        let ident = self.ident();
        let permission = Permission::new(KIND_MODULE, &ident.symbolic_name, "start");
        if !ctx.domain.check(&ident, &permission)? {
            return Err(RuntimeError::PermissionDenied {
                module: ident.to_string(),
                permission: permission.to_string(),
            });
        }

        // Resolve the activator factory before any state changes so an
        // unknown name cannot leave the module mid-transition.
        let descriptor = self.descriptor();
        let mut activator = ctx.build_activator(&descriptor)?;

        self.set_state(ModuleState::Starting);
        ctx.queue
            .post(Event::lifecycle(LifecycleTopic::Starting, ident.clone()))
            .await;

        let module_ctx = RuntimeModuleContext::new(
            ident.clone(),
            descriptor,
            ctx.wirings.clone(),
            ctx.queue.clone(),
        );

        match activator.start(&module_ctx) {
            Ok(()) => {
                slot.activator = Some(activator);
                self.set_state(ModuleState::Active);
                if let Err(err) = ctx.store.set_start_flag(self.numeric, true) {
                    warn!(module = %ident, error = %err, "start flag not persisted");
                }
                info!(module = %ident, "started");
                ctx.queue
                    .post(Event::lifecycle(LifecycleTopic::Started, ident))
                    .await;
                Ok(())
            }
            Err(cause) => {
                // Unwind: never silently swallowed, never half-started.
                self.set_state(ModuleState::Resolved);
                warn!(module = %ident, error = %cause, "activation failed, rolled back to resolved");
                ctx.queue
                    .post(
                        Event::framework(FrameworkTopic::Error, ident.clone())
                            .with_cause(cause.to_string()),
                    )
                    .await;
                Err(RuntimeError::ActivationFailed {
                    module: ident.to_string(),
                    cause: cause.to_string(),
                })
            }
        }
    }

    /// Stops the module. Idempotent when already at rest.
    ///
    /// # Errors
    ///
    /// An illegal-transition [`RuntimeError::Module`] on an
    /// uninstalled module, or [`RuntimeError::ActivationFailed`] when
    /// the deactivator reported failure (the module still comes to
    /// rest at RESOLVED).
    pub async fn stop(self: &Arc<Self>, ctx: &FrameworkContext) -> Result<(), RuntimeError> {
        let mut slot = self.transition.lock().await;
        self.stop_locked(ctx, &mut slot).await
    }

    pub(crate) async fn stop_locked(
        self: &Arc<Self>,
        ctx: &FrameworkContext,
        slot: &mut MutexGuard<'_, ActivatorSlot>,
    ) -> Result<(), RuntimeError> {
        match self.state() {
            ModuleState::Resolved | ModuleState::Installed => return Ok(()),
            ModuleState::Uninstalled | ModuleState::Starting | ModuleState::Stopping => {
                return Err(ModuleError::illegal(self.state(), "stop").into());
            }
            ModuleState::Active => {}
        }

        let ident = self.ident();
        let permission = Permission::new(KIND_MODULE, &ident.symbolic_name, "stop");
        if !ctx.domain.check(&ident, &permission)? {
            return Err(RuntimeError::PermissionDenied {
                module: ident.to_string(),
                permission: permission.to_string(),
            });
        }

        self.set_state(ModuleState::Stopping);
        ctx.queue
            .post(Event::lifecycle(LifecycleTopic::Stopping, ident.clone()))
            .await;

        let result = match slot.activator.take() {
            Some(mut activator) => {
                let module_ctx = RuntimeModuleContext::new(
                    ident.clone(),
                    self.descriptor(),
                    ctx.wirings.clone(),
                    ctx.queue.clone(),
                );
                activator.stop(&module_ctx)
            }
            None => Ok(()),
        };

        // Whatever the deactivator did, the module comes to rest.
        self.set_state(ModuleState::Resolved);
        if let Err(err) = ctx.store.set_start_flag(self.numeric, false) {
            warn!(module = %ident, error = %err, "start flag not persisted");
        }
        info!(module = %ident, "stopped");
        ctx.queue
            .post(Event::lifecycle(LifecycleTopic::Stopped, ident.clone()))
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(cause) => {
                ctx.queue
                    .post(
                        Event::framework(FrameworkTopic::Error, ident.clone())
                            .with_cause(cause.to_string()),
                    )
                    .await;
                Err(RuntimeError::ActivationFailed {
                    module: ident.to_string(),
                    cause: cause.to_string(),
                })
            }
        }
    }

    /// Replaces content and descriptor in place, preserving the
    /// numeric id and location. An ACTIVE module is stopped and
    /// restarted transactionally; when the restart fails the module
    /// is left RESOLVED and the failure returned.
    ///
    /// # Errors
    ///
    /// Descriptor errors abort before any state change. Restart
    /// failures surface as the underlying start error.
    pub async fn update(
        self: &Arc<Self>,
        ctx: &FrameworkContext,
        archive: ModuleArchive,
    ) -> Result<(), RuntimeError> {
        let mut slot = self.transition.lock().await;

        if self.state() == ModuleState::Uninstalled {
            return Err(ModuleError::illegal(self.state(), "update").into());
        }

        // Validate everything up front: a bad archive must not touch
        // the running module.
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

        let was_active = self.state() == ModuleState::Active;
        if was_active {
            // A failing deactivator is reported through the event path
            // by stop_locked; the update itself proceeds.
            if let Err(err) = self.stop_locked(ctx, &mut slot).await {
                warn!(module = self.numeric, error = %err, "stop during update reported failure");
            }
        }

        let old_ident = self.ident();
        ctx.store.put_content(self.numeric, &old_ident.location, &archive)?;

        let new_ident = old_ident.restamped(&descriptor.symbolic_name, descriptor.version.clone());
        *self.ident.write() = new_ident.clone();
        *self.descriptor.write() = Arc::clone(&descriptor);
        if let Some(entries) = entries {
            ctx.domain.set_entries(self.numeric, entries);
        }

        // The old wiring describes contracts that no longer exist.
        ctx.wirings.drop_wiring(self.numeric);
        self.set_state(ModuleState::Installed);

        info!(module = %new_ident, "updated");
        ctx.queue
            .post(Event::lifecycle(LifecycleTopic::Updated, new_ident))
            .await;

        if was_active {
            self.start_locked(ctx, &mut slot).await?;
        }
        Ok(())
    }

    /// Uninstalls the module. Legal only at rest (INSTALLED or
    /// RESOLVED); terminal once it succeeds.
    ///
    /// # Errors
    ///
    /// An illegal-transition [`RuntimeError::Module`] from ACTIVE or
    /// transient states, [`RuntimeError::Store`] when the purge fails
    /// (the module is then left untouched).
    pub async fn uninstall(self: &Arc<Self>, ctx: &FrameworkContext) -> Result<(), RuntimeError> {
        let _slot = self.transition.lock().await;

        if !self.state().can_uninstall() {
            return Err(ModuleError::illegal(self.state(), "uninstall").into());
        }

        // Purge first: a storage fault aborts with state untouched.
        ctx.store.purge(self.numeric)?;

        let ident = self.ident();
        self.set_state(ModuleState::Uninstalled);
        ctx.wirings.drop_wiring(self.numeric);
        ctx.domain.remove_module(self.numeric);
        ctx.registry.release_module(self.numeric).await;

        info!(module = %ident, "uninstalled");
        ctx.queue
            .post(Event::lifecycle(LifecycleTopic::Uninstalled, ident))
            .await;
        Ok(())
    }
}

impl std::fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("id", &self.ident())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

//! Per-module symbol visibility.
//!
//! A module's namespace is defined entirely by its wiring: a lookup
//! traverses the module's own wires plus its own exports — never a
//! parent or sibling search. The view is discarded with the wiring at
//! uninstall/refresh.

use crate::{EventQueue, WiringTable};
use loam_event::Event;
use loam_module::{ModuleContext, ModuleDescriptor};
use loam_types::ModuleId;
use std::sync::Arc;
use tracing::warn;

/// Read-only wiring-scoped lookup for one module.
#[derive(Clone)]
pub struct NamespaceView {
    id: ModuleId,
    descriptor: Arc<ModuleDescriptor>,
    wirings: WiringTable,
}

impl NamespaceView {
    /// Creates the view for `id`.
    #[must_use]
    pub fn new(id: ModuleId, descriptor: Arc<ModuleDescriptor>, wirings: WiringTable) -> Self {
        Self {
            id,
            descriptor,
            wirings,
        }
    }

    /// Resolves `namespace` through the module's wires, falling back
    /// to its own exports. `None` means the symbol is simply not
    /// visible to this module.
    #[must_use]
    pub fn provider(&self, namespace: &str) -> Option<ModuleId> {
        if let Some(wiring) = self.wirings.get(self.id.id) {
            if let Some(provider) = wiring.provider_of(namespace) {
                return Some(provider.clone());
            }
        }
        self.descriptor
            .capabilities
            .iter()
            .any(|c| c.namespace == namespace)
            .then(|| self.id.clone())
    }
}

/// The [`ModuleContext`] handed to activators: identity, wiring-scoped
/// lookup, best-effort event posting.
pub struct RuntimeModuleContext {
    view: NamespaceView,
    queue: EventQueue,
}

impl RuntimeModuleContext {
    /// Creates the context for one activation cycle.
    #[must_use]
    pub fn new(
        id: ModuleId,
        descriptor: Arc<ModuleDescriptor>,
        wirings: WiringTable,
        queue: EventQueue,
    ) -> Self {
        Self {
            view: NamespaceView::new(id, descriptor, wirings),
            queue,
        }
    }
}

impl ModuleContext for RuntimeModuleContext {
    fn module_id(&self) -> &ModuleId {
        &self.view.id
    }

    fn visible_provider(&self, namespace: &str) -> Option<ModuleId> {
        self.view.provider(namespace)
    }

    fn post_event(&self, event: Event) {
        // Activators run under their module's transition lock; the
        // post must not block, so a full queue drops with a warning.
        if let Err(err) = self.queue.try_post(event) {
            warn!(module = %self.view.id, error = %err, "event dropped from module context");
        }
    }
}

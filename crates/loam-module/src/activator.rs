//! Module activation entry points.
//!
//! A module's runnable half is a [`ModuleActivator`]: the runtime
//! calls `start` on the STARTING → ACTIVE transition and `stop` on
//! STOPPING → RESOLVED. Activators are produced by named
//! [`ActivatorFactory`] functions registered with the framework —
//! the descriptor's `Module-Activator` header picks the factory by
//! name, so cross-module entry points are explicit and typed rather
//! than looked up reflectively.

use crate::ModuleError;
use loam_event::Event;
use loam_types::ModuleId;
use std::sync::Arc;

/// The view of the framework an activator is given.
///
/// Lookups traverse only the wires recorded for this module — a module
/// can never reach a provider it is not wired to, which is the
/// isolation namespace in trait form.
pub trait ModuleContext: Send + Sync {
    /// Identity of the module being activated.
    fn module_id(&self) -> &ModuleId;

    /// Returns the provider this module is wired to for `namespace`,
    /// or `None` when no wire exists. Never searches beyond the
    /// module's own wiring.
    fn visible_provider(&self, namespace: &str) -> Option<ModuleId>;

    /// Posts an event through the framework's queue (enqueue only;
    /// delivery is asynchronous).
    fn post_event(&self, event: Event);
}

/// Activation entry points for one module instance.
///
/// Calls are serialized by the module's own transition lock; `start`
/// and `stop` never overlap for the same instance.
///
/// # Example
///
/// ```
/// use loam_module::{ModuleActivator, ModuleContext, ModuleError};
///
/// struct HttpServer {
///     listening: bool,
/// }
///
/// impl ModuleActivator for HttpServer {
///     fn start(&mut self, ctx: &dyn ModuleContext) -> Result<(), ModuleError> {
///         if ctx.visible_provider("pkg.io").is_none() {
///             return Err(ModuleError::ActivationFailed("pkg.io not wired".into()));
///         }
///         self.listening = true;
///         Ok(())
///     }
///
///     fn stop(&mut self, _ctx: &dyn ModuleContext) -> Result<(), ModuleError> {
///         self.listening = false;
///         Ok(())
///     }
/// }
/// ```
pub trait ModuleActivator: Send {
    /// Runs on STARTING → ACTIVE. An error unwinds the module to
    /// RESOLVED and is reported, never swallowed.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::ActivationFailed`] (typically) to signal
    /// that the module cannot come up.
    fn start(&mut self, ctx: &dyn ModuleContext) -> Result<(), ModuleError>;

    /// Runs on STOPPING → RESOLVED. Errors are reported but the module
    /// still comes to rest at RESOLVED.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError`] to report teardown problems.
    fn stop(&mut self, ctx: &dyn ModuleContext) -> Result<(), ModuleError>;
}

/// Produces a fresh activator instance per activation cycle.
///
/// Registered with the framework under the name the
/// `Module-Activator` header refers to.
pub type ActivatorFactory = Arc<dyn Fn() -> Box<dyn ModuleActivator> + Send + Sync>;

/// An activator that does nothing; used for modules without a
/// `Module-Activator` header (pure capability providers).
#[derive(Debug, Default)]
pub struct InertActivator;

impl ModuleActivator for InertActivator {
    fn start(&mut self, _ctx: &dyn ModuleContext) -> Result<(), ModuleError> {
        Ok(())
    }

    fn stop(&mut self, _ctx: &dyn ModuleContext) -> Result<(), ModuleError> {
        Ok(())
    }
}

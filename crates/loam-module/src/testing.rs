//! Test support for module authors and the runtime's own tests.
//!
//! [`StubActivator`] records its start/stop invocations in a shared
//! log (the instance moves into the framework, the log handle stays
//! with the test) and can be scripted to fail, which is how the
//! activation-rollback paths are exercised.

use crate::{ModuleActivator, ModuleContext, ModuleError};
use loam_event::Event;
use loam_types::{ModuleId, Version};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Shared invocation log handed out by [`StubActivator::log_handle`].
pub type ActivationLog = Arc<Mutex<Vec<String>>>;

/// A scriptable activator for tests.
///
/// # Example
///
/// ```
/// use loam_module::testing::{StaticContext, StubActivator};
/// use loam_module::ModuleActivator;
///
/// let mut stub = StubActivator::new("worker");
/// let log = stub.log_handle();
/// let ctx = StaticContext::new("org.loam.worker");
///
/// stub.start(&ctx).unwrap();
/// stub.stop(&ctx).unwrap();
///
/// assert_eq!(*log.lock().unwrap(), vec!["worker:start", "worker:stop"]);
/// ```
pub struct StubActivator {
    name: String,
    log: ActivationLog,
    fail_start: Arc<AtomicBool>,
    fail_stop: Arc<AtomicBool>,
}

impl StubActivator {
    /// Creates a stub that succeeds on both entry points.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_log(name, Arc::new(Mutex::new(Vec::new())))
    }

    /// Creates a stub reporting into an externally-owned log —
    /// activator factories use this so every produced instance shares
    /// one log with the test.
    #[must_use]
    pub fn with_log(name: impl Into<String>, log: ActivationLog) -> Self {
        Self {
            name: name.into(),
            log,
            fail_start: Arc::new(AtomicBool::new(false)),
            fail_stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replaces the fail-start switch with a shared one.
    #[must_use]
    pub fn with_fail_start(mut self, switch: Arc<AtomicBool>) -> Self {
        self.fail_start = switch;
        self
    }

    /// Returns the shared log; entries are `"name:start"` /
    /// `"name:stop"` in invocation order.
    #[must_use]
    pub fn log_handle(&self) -> ActivationLog {
        Arc::clone(&self.log)
    }

    /// Returns a switch that makes the next `start` fail while set.
    #[must_use]
    pub fn fail_start_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.fail_start)
    }

    /// Returns a switch that makes the next `stop` fail while set.
    #[must_use]
    pub fn fail_stop_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.fail_stop)
    }

    fn record(&self, what: &str) {
        self.log
            .lock()
            .expect("activation log lock")
            .push(format!("{}:{what}", self.name));
    }
}

impl ModuleActivator for StubActivator {
    fn start(&mut self, _ctx: &dyn ModuleContext) -> Result<(), ModuleError> {
        self.record("start");
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(ModuleError::ActivationFailed(format!(
                "{} scripted start failure",
                self.name
            )));
        }
        Ok(())
    }

    fn stop(&mut self, _ctx: &dyn ModuleContext) -> Result<(), ModuleError> {
        self.record("stop");
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(ModuleError::ActivationFailed(format!(
                "{} scripted stop failure",
                self.name
            )));
        }
        Ok(())
    }
}

/// A standalone [`ModuleContext`] for unit tests: fixed identity, no
/// wiring, events collected in memory.
pub struct StaticContext {
    id: ModuleId,
    events: Mutex<Vec<Event>>,
}

impl StaticContext {
    /// Creates a context for a fake module with the given symbolic
    /// name.
    #[must_use]
    pub fn new(symbolic_name: &str) -> Self {
        Self {
            id: ModuleId::new(
                0,
                symbolic_name,
                Version::new(0, 0, 0),
                format!("test:{symbolic_name}"),
            ),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Returns the events posted so far.
    #[must_use]
    pub fn posted(&self) -> Vec<Event> {
        self.events.lock().expect("events lock").clone()
    }
}

impl ModuleContext for StaticContext {
    fn module_id(&self) -> &ModuleId {
        &self.id
    }

    fn visible_provider(&self, _namespace: &str) -> Option<ModuleId> {
        None
    }

    fn post_event(&self, event: Event) {
        self.events.lock().expect("events lock").push(event);
    }
}

//! Listener trait and subscription filters.

use crate::{Event, EventError, EventKind};
use loam_types::Filter;

/// Receiver of delivered events.
///
/// Invocations happen on the event queue's worker, never on the thread
/// that posted the event. A returned error is logged and delivery
/// continues with the remaining listeners — a listener can break only
/// itself.
///
/// # Example
///
/// ```
/// use loam_event::{Event, EventError, EventListener};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// #[derive(Default)]
/// struct Counter(AtomicUsize);
///
/// impl EventListener for Counter {
///     fn on_event(&self, _event: &Event) -> Result<(), EventError> {
///         self.0.fetch_add(1, Ordering::SeqCst);
///         Ok(())
///     }
/// }
/// ```
pub trait EventListener: Send + Sync {
    /// Handles one delivered event.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::ListenerFailed`] (or any variant) to
    /// report a handling failure; the queue logs it and moves on.
    fn on_event(&self, event: &Event) -> Result<(), EventError>;
}

/// Selects which events a subscription receives.
///
/// The kind gate is mandatory; the attribute filter is optional and is
/// evaluated against [`Event::filter_attrs`].
#[derive(Debug, Clone)]
pub struct ListenerFilter {
    /// Event kind this subscription accepts.
    pub kind: EventKind,
    /// Optional attribute predicate.
    pub filter: Option<Filter>,
}

impl ListenerFilter {
    /// Accepts every event of `kind`.
    #[must_use]
    pub fn kind(kind: EventKind) -> Self {
        Self { kind, filter: None }
    }

    /// Accepts events of `kind` whose attributes match `filter`.
    #[must_use]
    pub fn with_filter(kind: EventKind, filter: Filter) -> Self {
        Self {
            kind,
            filter: Some(filter),
        }
    }

    /// Returns `true` if `event` passes this subscription's gate.
    #[must_use]
    pub fn accepts(&self, event: &Event) -> bool {
        if event.kind() != self.kind {
            return false;
        }
        match &self.filter {
            None => true,
            Some(filter) => filter.matches(&event.filter_attrs()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LifecycleTopic;
    use loam_types::{ModuleId, Version};

    fn module(name: &str) -> ModuleId {
        ModuleId::new(1, name, Version::new(1, 0, 0), format!("mem:{name}"))
    }

    #[test]
    fn kind_gate() {
        let sub = ListenerFilter::kind(EventKind::Lifecycle);
        let lifecycle = Event::lifecycle(LifecycleTopic::Started, module("a"));
        let framework = Event::framework(crate::FrameworkTopic::Started, module("a"));
        assert!(sub.accepts(&lifecycle));
        assert!(!sub.accepts(&framework));
    }

    #[test]
    fn attribute_filter_gate() {
        let filter = Filter::parse("(module=a)").unwrap();
        let sub = ListenerFilter::with_filter(EventKind::Lifecycle, filter);
        assert!(sub.accepts(&Event::lifecycle(LifecycleTopic::Started, module("a"))));
        assert!(!sub.accepts(&Event::lifecycle(LifecycleTopic::Started, module("b"))));
    }
}

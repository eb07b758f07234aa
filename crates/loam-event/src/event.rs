//! The event value.
//!
//! An [`Event`] is immutable once constructed: the queue fans the same
//! instance out to every matching listener behind an `Arc`, so no
//! copy-on-deliver is needed and listeners can never observe a
//! half-mutated payload.

use crate::{EventKind, FrameworkTopic, LifecycleTopic, ServiceTopic, Topic};
use chrono::{DateTime, Utc};
use loam_types::{AttrValue, Attrs, EventId, ModuleId, ServiceId};
use serde::{Deserialize, Serialize};

/// An immutable runtime event.
///
/// # Example
///
/// ```
/// use loam_event::{Event, EventKind, LifecycleTopic};
/// use loam_types::{ModuleId, Version};
///
/// let source = ModuleId::new(1, "org.loam.log", Version::new(1, 0, 0), "file:log");
/// let event = Event::lifecycle(LifecycleTopic::Started, source.clone());
///
/// assert_eq!(event.kind(), EventKind::Lifecycle);
/// assert_eq!(event.source, source);
/// assert!(event.cause.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique id of this event instance.
    pub id: EventId,
    /// What happened.
    pub topic: Topic,
    /// The module this event is about.
    pub source: ModuleId,
    /// Error text for failure topics; `None` otherwise.
    pub cause: Option<String>,
    /// Construction time.
    pub timestamp: DateTime<Utc>,
    /// Additional typed properties; listener filters match against
    /// these (plus the implicit `module` and `kind` keys, see
    /// [`Event::filter_attrs`]).
    pub props: Attrs,
}

impl Event {
    /// Creates an event with an explicit topic and empty properties.
    #[must_use]
    pub fn new(topic: Topic, source: ModuleId) -> Self {
        Self {
            id: EventId::new(),
            topic,
            source,
            cause: None,
            timestamp: Utc::now(),
            props: Attrs::new(),
        }
    }

    /// Creates a lifecycle event.
    #[must_use]
    pub fn lifecycle(topic: LifecycleTopic, source: ModuleId) -> Self {
        Self::new(Topic::Lifecycle(topic), source)
    }

    /// Creates a service event carrying the service id and its
    /// interface names as filterable properties.
    #[must_use]
    pub fn service(
        topic: ServiceTopic,
        source: ModuleId,
        service: ServiceId,
        interfaces: &[String],
    ) -> Self {
        let mut event = Self::new(Topic::Service(topic), source);
        event
            .props
            .insert("service.id".into(), AttrValue::Int(service.value() as i64));
        if let Some(first) = interfaces.first() {
            event
                .props
                .insert("service.interface".into(), AttrValue::from(first.as_str()));
        }
        event
    }

    /// Creates a framework event.
    #[must_use]
    pub fn framework(topic: FrameworkTopic, source: ModuleId) -> Self {
        Self::new(Topic::Framework(topic), source)
    }

    /// Attaches an error cause (builder style).
    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Adds a filterable property (builder style).
    #[must_use]
    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    /// Returns the kind of this event's topic.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.topic.kind()
    }

    /// Returns the attribute view listener filters are evaluated
    /// against: the property bag plus implicit `module`, `module.id`
    /// and `kind` keys.
    #[must_use]
    pub fn filter_attrs(&self) -> Attrs {
        let mut attrs = self.props.clone();
        attrs.insert(
            "module".into(),
            AttrValue::from(self.source.symbolic_name.as_str()),
        );
        attrs.insert("module.id".into(), AttrValue::Int(self.source.id as i64));
        attrs.insert("kind".into(), AttrValue::from(self.kind().to_string()));
        attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_types::{Filter, Version};

    fn module() -> ModuleId {
        ModuleId::new(4, "org.loam.demo", Version::new(1, 0, 0), "mem:demo")
    }

    #[test]
    fn lifecycle_constructor() {
        let e = Event::lifecycle(LifecycleTopic::Installed, module());
        assert_eq!(e.kind(), EventKind::Lifecycle);
        assert_eq!(e.topic, Topic::Lifecycle(LifecycleTopic::Installed));
        assert!(e.props.is_empty());
    }

    #[test]
    fn service_event_carries_filterable_props() {
        let e = Event::service(
            ServiceTopic::Registered,
            module(),
            ServiceId(12),
            &["svc.Logger".to_string()],
        );
        assert_eq!(e.props.get("service.id"), Some(&AttrValue::Int(12)));
        assert_eq!(
            e.props.get("service.interface"),
            Some(&AttrValue::from("svc.Logger"))
        );
    }

    #[test]
    fn cause_builder() {
        let e = Event::framework(FrameworkTopic::Error, module()).with_cause("activator panicked");
        assert_eq!(e.cause.as_deref(), Some("activator panicked"));
    }

    #[test]
    fn filter_attrs_include_implicit_keys() {
        let e = Event::lifecycle(LifecycleTopic::Started, module()).with_prop("extra", 1i64);
        let attrs = e.filter_attrs();
        assert_eq!(attrs.get("module"), Some(&AttrValue::from("org.loam.demo")));
        assert_eq!(attrs.get("module.id"), Some(&AttrValue::Int(4)));
        assert_eq!(attrs.get("kind"), Some(&AttrValue::from("lifecycle")));
        assert_eq!(attrs.get("extra"), Some(&AttrValue::Int(1)));
    }

    #[test]
    fn filters_select_events() {
        let e = Event::lifecycle(LifecycleTopic::Started, module());
        let matching = Filter::parse("(module=org.loam.demo)").unwrap();
        let other = Filter::parse("(module=org.loam.other)").unwrap();
        assert!(matching.matches(&e.filter_attrs()));
        assert!(!other.matches(&e.filter_attrs()));
    }

    #[test]
    fn event_ids_unique() {
        let a = Event::lifecycle(LifecycleTopic::Started, module());
        let b = Event::lifecycle(LifecycleTopic::Started, module());
        assert_ne!(a.id, b.id);
    }
}

//! The service registry.
//!
//! Modules publish service instances under interface names; consumers
//! look them up ranked. The reference list is copy-on-write: readers
//! clone an `Arc` of the current vector and never block writers, and
//! vice versa.
//!
//! # Ordering
//!
//! `get_service_references` orders by ranking descending, then
//! numeric service id ascending — equal rankings go to the earlier
//! registration.

use crate::EventQueue;
use loam_event::{Event, ServiceTopic};
use loam_types::{AttrValue, Attrs, Filter, ModuleId, ServiceId};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Property key carrying the ranking in registration properties.
pub const RANKING_PROP: &str = "service.ranking";

/// One registered service.
pub struct ServiceEntry {
    /// Registry-assigned monotonic id.
    pub id: ServiceId,
    /// Interface names the instance is published under.
    pub interfaces: Vec<String>,
    /// Ranking (default 0); higher wins lookups.
    pub ranking: i32,
    /// Owning module.
    pub owner: ModuleId,
    /// Registration properties.
    pub props: Attrs,
    instance: Arc<dyn Any + Send + Sync>,
}

impl ServiceEntry {
    /// The attribute view filters are evaluated against: properties
    /// plus implicit `service.id` and `service.ranking`.
    #[must_use]
    pub fn filter_attrs(&self) -> Attrs {
        let mut attrs = self.props.clone();
        attrs.insert(
            "service.id".into(),
            AttrValue::Int(self.id.value() as i64),
        );
        attrs.insert(RANKING_PROP.into(), AttrValue::Int(i64::from(self.ranking)));
        attrs
    }

    /// Returns the service instance for downcasting.
    #[must_use]
    pub fn instance(&self) -> Arc<dyn Any + Send + Sync> {
        Arc::clone(&self.instance)
    }
}

impl std::fmt::Debug for ServiceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceEntry")
            .field("id", &self.id)
            .field("interfaces", &self.interfaces)
            .field("ranking", &self.ranking)
            .field("owner", &self.owner.id)
            .finish_non_exhaustive()
    }
}

struct RegistryInner {
    entries: RwLock<Arc<Vec<Arc<ServiceEntry>>>>,
    next_id: AtomicU64,
    /// Use counts keyed by (consumer module, service) — plain id
    /// lookups, no back-references into module state.
    uses: Mutex<HashMap<(u64, ServiceId), usize>>,
    queue: EventQueue,
    /// Serializes registration events against listener back-fill: a
    /// late subscriber snapshots and posts its synthetic events under
    /// this lock, so it sees every service exactly once. Lookups
    /// never touch it.
    order: tokio::sync::Mutex<()>,
}

/// The registry handle; cheap to clone.
#[derive(Clone)]
pub struct ServiceRegistry {
    inner: Arc<RegistryInner>,
}

/// Unregistration handle returned by `register`. Holds only ids and a
/// weak registry link, so dropping a module's registrations is a
/// table removal, not a graph walk.
pub struct ServiceRegistration {
    /// The registered service's id.
    pub id: ServiceId,
    registry: Weak<RegistryInner>,
}

impl ServiceRegistration {
    /// Removes the registration from the registry. Safe to call after
    /// the registry itself is gone (no-op).
    pub async fn unregister(&self) {
        if let Some(inner) = self.registry.upgrade() {
            ServiceRegistry { inner }.unregister(self.id).await;
        }
    }
}

impl ServiceRegistry {
    /// Creates a registry posting its events through `queue`.
    #[must_use]
    pub fn new(queue: EventQueue) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                entries: RwLock::new(Arc::new(Vec::new())),
                next_id: AtomicU64::new(1),
                uses: Mutex::new(HashMap::new()),
                queue,
                order: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Registers a service instance.
    ///
    /// The ranking is read from the `service.ranking` property
    /// (default 0). A `Registered` event is posted through the queue.
    pub async fn register(
        &self,
        owner: ModuleId,
        interfaces: Vec<String>,
        instance: Arc<dyn Any + Send + Sync>,
        props: Attrs,
    ) -> ServiceRegistration {
        let id = ServiceId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let ranking = props
            .get(RANKING_PROP)
            .and_then(AttrValue::as_int)
            .and_then(|i| i32::try_from(i).ok())
            .unwrap_or(0);

        let entry = Arc::new(ServiceEntry {
            id,
            interfaces: interfaces.clone(),
            ranking,
            owner: owner.clone(),
            props,
            instance,
        });

        let _order = self.inner.order.lock().await;
        {
            let mut guard = self.inner.entries.write();
            let mut next = guard.as_ref().clone();
            next.push(entry);
            *guard = Arc::new(next);
        }
        debug!(service = %id, owner = %owner, ?interfaces, "service registered");

        self.inner
            .queue
            .post(Event::service(ServiceTopic::Registered, owner, id, &interfaces))
            .await;

        ServiceRegistration {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Returns matching services ordered by ranking descending, id
    /// ascending on ties.
    #[must_use]
    pub fn get_service_references(
        &self,
        interface: &str,
        filter: Option<&Filter>,
    ) -> Vec<Arc<ServiceEntry>> {
        let snapshot = Arc::clone(&self.inner.entries.read());
        let mut matches: Vec<Arc<ServiceEntry>> = snapshot
            .iter()
            .filter(|e| e.interfaces.iter().any(|i| i == interface))
            .filter(|e| filter.map_or(true, |f| f.matches(&e.filter_attrs())))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.ranking.cmp(&a.ranking).then(a.id.cmp(&b.id)));
        matches
    }

    /// Snapshot of every current registration (listener back-fill).
    #[must_use]
    pub fn all_references(&self) -> Vec<Arc<ServiceEntry>> {
        self.inner.entries.read().as_ref().clone()
    }

    /// Fetches a service instance for `consumer`, incrementing its use
    /// count. Returns `None` for an unknown id.
    #[must_use]
    pub fn get_service(&self, consumer: u64, id: ServiceId) -> Option<Arc<dyn Any + Send + Sync>> {
        let entry = {
            let snapshot = self.inner.entries.read();
            snapshot.iter().find(|e| e.id == id).cloned()
        }?;
        *self.inner.uses.lock().entry((consumer, id)).or_insert(0) += 1;
        Some(entry.instance())
    }

    /// Releases one use of a service. Returns `false` when the
    /// consumer held no use (ungetting below zero).
    pub fn unget_service(&self, consumer: u64, id: ServiceId) -> bool {
        let mut uses = self.inner.uses.lock();
        match uses.get_mut(&(consumer, id)) {
            Some(count) if *count > 0 => {
                *count -= 1;
                if *count == 0 {
                    uses.remove(&(consumer, id));
                }
                true
            }
            _ => {
                warn!(service = %id, consumer, "unget without a matching get");
                false
            }
        }
    }

    /// Current use count for one (consumer, service) pair.
    #[must_use]
    pub fn use_count(&self, consumer: u64, id: ServiceId) -> usize {
        self.inner.uses.lock().get(&(consumer, id)).copied().unwrap_or(0)
    }

    /// Replaces a registration's properties (re-reading the ranking)
    /// and posts a `Modified` event. Unknown ids are a no-op.
    pub async fn set_properties(&self, id: ServiceId, props: Attrs) {
        let updated = {
            let mut guard = self.inner.entries.write();
            let mut next = guard.as_ref().clone();
            let slot = next.iter_mut().find(|e| e.id == id);
            let updated = slot.map(|slot| {
                let ranking = props
                    .get(RANKING_PROP)
                    .and_then(AttrValue::as_int)
                    .and_then(|i| i32::try_from(i).ok())
                    .unwrap_or(0);
                let entry = Arc::new(ServiceEntry {
                    id: slot.id,
                    interfaces: slot.interfaces.clone(),
                    ranking,
                    owner: slot.owner.clone(),
                    props,
                    instance: slot.instance(),
                });
                *slot = Arc::clone(&entry);
                entry
            });
            if updated.is_some() {
                *guard = Arc::new(next);
            }
            updated
        };

        if let Some(entry) = updated {
            let _order = self.inner.order.lock().await;
            self.inner
                .queue
                .post(Event::service(
                    ServiceTopic::Modified,
                    entry.owner.clone(),
                    id,
                    &entry.interfaces,
                ))
                .await;
        }
    }

    /// Unregisters a service; posts `Unregistering` first so
    /// listeners can say goodbye, then removes the entry.
    pub async fn unregister(&self, id: ServiceId) {
        let entry = {
            let snapshot = self.inner.entries.read();
            snapshot.iter().find(|e| e.id == id).cloned()
        };
        let Some(entry) = entry else {
            return;
        };

        let _order = self.inner.order.lock().await;
        self.inner
            .queue
            .post(Event::service(
                ServiceTopic::Unregistering,
                entry.owner.clone(),
                id,
                &entry.interfaces,
            ))
            .await;

        {
            let mut guard = self.inner.entries.write();
            let next: Vec<Arc<ServiceEntry>> = guard
                .as_ref()
                .iter()
                .filter(|e| e.id != id)
                .cloned()
                .collect();
            *guard = Arc::new(next);
        }
        self.inner.uses.lock().retain(|(_, sid), _| *sid != id);
        debug!(service = %id, "service unregistered");
    }

    /// Removes everything a module touched: its registrations and its
    /// outstanding uses. Called on uninstall.
    pub async fn release_module(&self, module: u64) {
        let owned: Vec<ServiceId> = {
            let snapshot = self.inner.entries.read();
            snapshot
                .iter()
                .filter(|e| e.owner.id == module)
                .map(|e| e.id)
                .collect()
        };
        for id in owned {
            self.unregister(id).await;
        }
        self.inner.uses.lock().retain(|(consumer, _), _| *consumer != module);
    }

    /// Number of live registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Acquires the registration-order lock. While held, no
    /// registration or unregistration can post its event — the
    /// framework's listener back-fill runs under this guard so a late
    /// subscriber observes every service exactly once.
    pub(crate) async fn order_lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.inner.order.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_event::{EventKind, EventListener, ListenerFilter};
    use loam_types::Version;
    use std::time::Duration;

    fn queue() -> EventQueue {
        EventQueue::new(64, Duration::from_millis(200))
    }

    fn owner(id: u64) -> ModuleId {
        ModuleId::new(id, "org.loam.owner", Version::new(1, 0, 0), "mem:owner")
    }

    fn ranked(r: i32) -> Attrs {
        let mut props = Attrs::new();
        props.insert(RANKING_PROP.into(), AttrValue::Int(i64::from(r)));
        props
    }

    struct NoopService;

    async fn register(registry: &ServiceRegistry, ranking: i32) -> ServiceRegistration {
        registry
            .register(
                owner(1),
                vec!["svc.Example".to_string()],
                Arc::new(NoopService),
                ranked(ranking),
            )
            .await
    }

    #[tokio::test]
    async fn ranking_then_id_ordering() {
        let registry = ServiceRegistry::new(queue());
        // Rankings [0, 5, 5, -1] in registration order.
        let s0 = register(&registry, 0).await;
        let s5a = register(&registry, 5).await;
        let s5b = register(&registry, 5).await;
        let sneg = register(&registry, -1).await;

        let refs = registry.get_service_references("svc.Example", None);
        let order: Vec<ServiceId> = refs.iter().map(|e| e.id).collect();
        assert_eq!(order, vec![s5a.id, s5b.id, s0.id, sneg.id]);
    }

    #[tokio::test]
    async fn interface_and_filter_matching() {
        let registry = ServiceRegistry::new(queue());
        let mut props = ranked(0);
        props.insert("codec".into(), AttrValue::from("json"));
        registry
            .register(owner(1), vec!["svc.Codec".into()], Arc::new(NoopService), props)
            .await;
        registry
            .register(owner(1), vec!["svc.Codec".into()], Arc::new(NoopService), ranked(0))
            .await;

        assert_eq!(registry.get_service_references("svc.Codec", None).len(), 2);
        assert_eq!(registry.get_service_references("svc.Other", None).len(), 0);

        let filter = Filter::parse("(codec=json)").unwrap();
        let filtered = registry.get_service_references("svc.Codec", Some(&filter));
        assert_eq!(filtered.len(), 1);
    }

    #[tokio::test]
    async fn use_counting() {
        let registry = ServiceRegistry::new(queue());
        let reg = register(&registry, 0).await;

        assert!(registry.get_service(7, reg.id).is_some());
        assert!(registry.get_service(7, reg.id).is_some());
        assert_eq!(registry.use_count(7, reg.id), 2);

        assert!(registry.unget_service(7, reg.id));
        assert!(registry.unget_service(7, reg.id));
        assert_eq!(registry.use_count(7, reg.id), 0);

        // Below zero is rejected.
        assert!(!registry.unget_service(7, reg.id));
    }

    #[tokio::test]
    async fn unregister_via_handle() {
        let registry = ServiceRegistry::new(queue());
        let reg = register(&registry, 0).await;
        assert_eq!(registry.len(), 1);

        reg.unregister().await;
        assert_eq!(registry.len(), 0);
        assert!(registry.get_service(1, reg.id).is_none());
    }

    #[tokio::test]
    async fn release_module_drops_registrations_and_uses() {
        let registry = ServiceRegistry::new(queue());
        let reg = registry
            .register(owner(3), vec!["svc.A".into()], Arc::new(NoopService), ranked(0))
            .await;
        registry.get_service(9, reg.id);

        registry.release_module(3).await;
        assert!(registry.is_empty());
        assert_eq!(registry.use_count(9, reg.id), 0);
    }

    #[tokio::test]
    async fn events_posted_on_register_and_unregister() {
        #[derive(Default)]
        struct Topics(std::sync::Mutex<Vec<String>>);
        impl EventListener for Topics {
            fn on_event(&self, event: &Event) -> Result<(), loam_event::EventError> {
                self.0.lock().unwrap().push(event.topic.to_string());
                Ok(())
            }
        }

        let queue = queue();
        let seen = Arc::new(Topics::default());
        queue.subscribe(
            ListenerFilter::kind(EventKind::Service),
            Arc::clone(&seen) as Arc<dyn EventListener>,
        );

        let registry = ServiceRegistry::new(queue.clone());
        let reg = register(&registry, 0).await;
        registry.unregister(reg.id).await;
        queue.flush().await;

        let topics = seen.0.lock().unwrap().clone();
        assert_eq!(topics, vec!["service/Registered", "service/Unregistering"]);
    }

    #[tokio::test]
    async fn set_properties_reranks_and_fires_modified() {
        let queue = queue();
        let registry = ServiceRegistry::new(queue.clone());
        let low = register(&registry, 0).await;
        let high = register(&registry, 10).await;

        let refs = registry.get_service_references("svc.Example", None);
        assert_eq!(refs[0].id, high.id);

        registry.set_properties(low.id, ranked(99)).await;
        queue.flush().await;

        let refs = registry.get_service_references("svc.Example", None);
        assert_eq!(refs[0].id, low.id);
        assert_eq!(refs[0].ranking, 99);
    }

    #[tokio::test]
    async fn unknown_service_get_is_none() {
        let registry = ServiceRegistry::new(queue());
        assert!(registry.get_service(1, ServiceId(404)).is_none());
    }
}

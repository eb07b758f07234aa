//! Service registry and event delivery through the framework API.

use loam_event::{
    Event, EventError, EventKind, EventListener, LifecycleTopic, ListenerFilter, ServiceTopic,
    Topic,
};
use loam_types::{AttrValue, Attrs, ServiceId};
use std::sync::{Arc, Mutex};

mod common;
use common::{archive_bytes, framework_in, manifest};

#[derive(Default)]
struct Recorder(Mutex<Vec<String>>);

impl Recorder {
    fn seen(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl EventListener for Recorder {
    fn on_event(&self, event: &Event) -> Result<(), EventError> {
        self.0.lock().unwrap().push(event.topic.to_string());
        Ok(())
    }
}

fn ranked(r: i64) -> Attrs {
    let mut props = Attrs::new();
    props.insert("service.ranking".into(), AttrValue::Int(r));
    props
}

struct Nothing;

#[tokio::test]
async fn ranking_order_with_ties() {
    let dir = tempfile::tempdir().unwrap();
    let framework = framework_in(&dir);
    let owner = framework
        .install(
            "file:owner",
            &archive_bytes(&manifest("org.loam.owner", "1.0.0", None, &[], &[])),
        )
        .await
        .unwrap();

    // Rankings [0, 5, 5, -1] in registration order.
    let registry = framework.registry();
    let mut ids: Vec<ServiceId> = Vec::new();
    for ranking in [0i64, 5, 5, -1] {
        let reg = registry
            .register(
                owner.clone(),
                vec!["svc.Example".into()],
                Arc::new(Nothing),
                ranked(ranking),
            )
            .await;
        ids.push(reg.id);
    }

    let refs = registry.get_service_references("svc.Example", None);
    let order: Vec<ServiceId> = refs.iter().map(|e| e.id).collect();
    // [first-5, second-5, 0, -1]
    assert_eq!(order, vec![ids[1], ids[2], ids[0], ids[3]]);
}

#[tokio::test]
async fn lifecycle_events_arrive_in_posting_order() {
    let dir = tempfile::tempdir().unwrap();
    let framework = framework_in(&dir);

    let recorder = Arc::new(Recorder::default());
    framework
        .add_listener(
            ListenerFilter::kind(EventKind::Lifecycle),
            Arc::clone(&recorder) as Arc<dyn EventListener>,
        )
        .await;

    let id = framework
        .install(
            "file:seq",
            &archive_bytes(&manifest("org.loam.seq", "1.0.0", None, &[], &[])),
        )
        .await
        .unwrap();
    framework.start(id.id).await.unwrap();
    framework.stop(id.id).await.unwrap();
    framework.context().queue.flush().await;

    assert_eq!(
        recorder.seen(),
        vec![
            "lifecycle/Installed",
            "lifecycle/Resolved",
            "lifecycle/Starting",
            "lifecycle/Started",
            "lifecycle/Stopping",
            "lifecycle/Stopped",
        ]
    );
}

#[tokio::test]
async fn late_service_listener_gets_backfill_only_for_itself() {
    let dir = tempfile::tempdir().unwrap();
    let framework = framework_in(&dir);
    let owner = framework
        .install(
            "file:owner",
            &archive_bytes(&manifest("org.loam.owner", "1.0.0", None, &[], &[])),
        )
        .await
        .unwrap();

    // Early listener sees the live registration events.
    let early = Arc::new(Recorder::default());
    framework
        .add_listener(
            ListenerFilter::kind(EventKind::Service),
            Arc::clone(&early) as Arc<dyn EventListener>,
        )
        .await;

    framework
        .registry()
        .register(owner.clone(), vec!["svc.A".into()], Arc::new(Nothing), Attrs::new())
        .await;
    framework
        .registry()
        .register(owner.clone(), vec!["svc.B".into()], Arc::new(Nothing), Attrs::new())
        .await;
    framework.context().queue.flush().await;
    assert_eq!(early.seen().len(), 2);

    // Late listener: synthetic Registered for both existing services.
    let late = Arc::new(Recorder::default());
    framework
        .add_listener(
            ListenerFilter::kind(EventKind::Service),
            Arc::clone(&late) as Arc<dyn EventListener>,
        )
        .await;
    framework.context().queue.flush().await;

    assert_eq!(
        late.seen(),
        vec!["service/Registered", "service/Registered"]
    );
    // The early listener saw no duplicates from the back-fill.
    assert_eq!(early.seen().len(), 2);
}

#[tokio::test]
async fn failing_listener_does_not_break_others() {
    struct Exploding;
    impl EventListener for Exploding {
        fn on_event(&self, _event: &Event) -> Result<(), EventError> {
            Err(EventError::ListenerFailed("scripted".into()))
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let framework = framework_in(&dir);

    framework
        .add_listener(
            ListenerFilter::kind(EventKind::Lifecycle),
            Arc::new(Exploding) as Arc<dyn EventListener>,
        )
        .await;
    let recorder = Arc::new(Recorder::default());
    framework
        .add_listener(
            ListenerFilter::kind(EventKind::Lifecycle),
            Arc::clone(&recorder) as Arc<dyn EventListener>,
        )
        .await;

    framework
        .install(
            "file:x",
            &archive_bytes(&manifest("org.loam.x", "1.0.0", None, &[], &[])),
        )
        .await
        .unwrap();
    framework.context().queue.flush().await;

    assert_eq!(recorder.seen(), vec!["lifecycle/Installed"]);
}

#[tokio::test]
async fn get_unget_use_counting_and_uninstall_release() {
    let dir = tempfile::tempdir().unwrap();
    let framework = framework_in(&dir);
    let provider = framework
        .install(
            "file:provider",
            &archive_bytes(&manifest("org.loam.provider", "1.0.0", None, &[], &[])),
        )
        .await
        .unwrap();
    let consumer = framework
        .install(
            "file:consumer",
            &archive_bytes(&manifest("org.loam.consumer", "1.0.0", None, &[], &[])),
        )
        .await
        .unwrap();

    let registry = framework.registry();
    let reg = registry
        .register(
            provider.clone(),
            vec!["svc.Shared".into()],
            Arc::new(Nothing),
            Attrs::new(),
        )
        .await;

    assert!(registry.get_service(consumer.id, reg.id).is_some());
    assert_eq!(registry.use_count(consumer.id, reg.id), 1);
    assert!(registry.unget_service(consumer.id, reg.id));
    assert!(!registry.unget_service(consumer.id, reg.id));

    // Uninstalling the provider unregisters its services.
    framework.uninstall(provider.id).await.unwrap();
    assert!(registry.get_service(consumer.id, reg.id).is_none());
    assert!(registry.get_service_references("svc.Shared", None).is_empty());
}

#[tokio::test]
async fn service_events_fire_on_unregister_topics() {
    let dir = tempfile::tempdir().unwrap();
    let framework = framework_in(&dir);
    let owner = framework
        .install(
            "file:owner",
            &archive_bytes(&manifest("org.loam.owner", "1.0.0", None, &[], &[])),
        )
        .await
        .unwrap();

    let recorder = Arc::new(Recorder::default());
    framework
        .add_listener(
            ListenerFilter::kind(EventKind::Service),
            Arc::clone(&recorder) as Arc<dyn EventListener>,
        )
        .await;

    let reg = framework
        .registry()
        .register(owner, vec!["svc.T".into()], Arc::new(Nothing), Attrs::new())
        .await;
    framework.registry().unregister(reg.id).await;
    framework.context().queue.flush().await;

    assert_eq!(
        recorder.seen(),
        vec!["service/Registered", "service/Unregistering"]
    );
}

/// A listener that re-enters the framework: refreshing from within
/// the callback triggered by the very events the refresh causes.
#[tokio::test]
async fn refresh_from_listener_callback_is_safe() {
    let dir = tempfile::tempdir().unwrap();
    let framework = Arc::new(framework_in(&dir));
    let id = framework
        .install(
            "file:reentrant",
            &archive_bytes(&manifest("org.loam.reentrant", "1.0.0", None, &[], &[])),
        )
        .await
        .unwrap();

    struct Reentrant {
        framework: Arc<loam_runtime::Framework>,
        target: u64,
        fired: Mutex<bool>,
    }
    impl EventListener for Reentrant {
        fn on_event(&self, event: &Event) -> Result<(), EventError> {
            if event.topic != Topic::Lifecycle(LifecycleTopic::Stopped) {
                return Ok(());
            }
            let mut fired = self.fired.lock().unwrap();
            if *fired {
                return Ok(());
            }
            *fired = true;
            // Re-enter from the delivery worker: spawned, because the
            // listener contract is synchronous. The refresh contends
            // on the module locks like any other caller.
            let framework = Arc::clone(&self.framework);
            let target = self.target;
            tokio::spawn(async move {
                framework.refresh_modules(Some(&[target])).await.unwrap();
            });
            Ok(())
        }
    }

    framework
        .add_listener(
            ListenerFilter::kind(EventKind::Lifecycle),
            Arc::new(Reentrant {
                framework: Arc::clone(&framework),
                target: id.id,
                fired: Mutex::new(false),
            }) as Arc<dyn EventListener>,
        )
        .await;

    framework.start(id.id).await.unwrap();
    framework.stop(id.id).await.unwrap();
    framework.context().queue.flush().await;

    // Give the spawned refresh time to run, then observe a consistent
    // resting state.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let state = framework.state_of(id.id).unwrap();
    assert!(
        state == loam_module::ModuleState::Resolved
            || state == loam_module::ModuleState::Installed
    );
    framework.context().queue.flush().await;
}

#[tokio::test]
async fn service_topic_enum_matches_event() {
    // Sanity: the synthetic back-fill event advertises its service id.
    let dir = tempfile::tempdir().unwrap();
    let framework = framework_in(&dir);
    let owner = framework
        .install(
            "file:owner",
            &archive_bytes(&manifest("org.loam.owner", "1.0.0", None, &[], &[])),
        )
        .await
        .unwrap();
    let reg = framework
        .registry()
        .register(owner, vec!["svc.Z".into()], Arc::new(Nothing), Attrs::new())
        .await;

    #[derive(Default)]
    struct IdWatch(Mutex<Vec<i64>>);
    impl EventListener for IdWatch {
        fn on_event(&self, event: &Event) -> Result<(), EventError> {
            if event.topic == Topic::Service(ServiceTopic::Registered) {
                if let Some(AttrValue::Int(id)) = event.props.get("service.id") {
                    self.0.lock().unwrap().push(*id);
                }
            }
            Ok(())
        }
    }
    let watch = Arc::new(IdWatch::default());
    framework
        .add_listener(
            ListenerFilter::kind(EventKind::Service),
            Arc::clone(&watch) as Arc<dyn EventListener>,
        )
        .await;
    framework.context().queue.flush().await;

    assert_eq!(*watch.0.lock().unwrap(), vec![reg.id.value() as i64]);
}

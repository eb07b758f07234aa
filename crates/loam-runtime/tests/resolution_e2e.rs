//! Resolution behavior through the public framework API, including
//! the export/require/update/refresh scenario.

use loam_event::{Event, EventError, EventKind, EventListener, LifecycleTopic, ListenerFilter, Topic};
use loam_module::ModuleState;
use std::sync::{Arc, Mutex};

mod common;
use common::{archive_bytes, framework_in, manifest};

#[tokio::test]
async fn requirement_produces_exactly_one_wire() {
    let dir = tempfile::tempdir().unwrap();
    let framework = framework_in(&dir);

    let a = framework
        .install(
            "file:a",
            &archive_bytes(&manifest(
                "org.loam.a",
                "1.0.0",
                None,
                &[("pkg", "1.0", "")],
                &[],
            )),
        )
        .await
        .unwrap();
    let b = framework
        .install(
            "file:b",
            &archive_bytes(&manifest(
                "org.loam.b",
                "1.0.0",
                None,
                &[],
                &[("pkg", "[1.0,2.0)", false)],
            )),
        )
        .await
        .unwrap();

    framework.resolve_all().await.unwrap();

    assert_eq!(framework.state_of(a.id), Some(ModuleState::Resolved));
    assert_eq!(framework.state_of(b.id), Some(ModuleState::Resolved));

    let wiring = framework.wiring_of(b.id).unwrap();
    assert_eq!(wiring.len(), 1);
    assert_eq!(wiring.wires[0].provider.id, a.id);
    assert_eq!(wiring.wires[0].capability.namespace, "pkg");
}

#[tokio::test]
async fn update_provider_and_refresh_breaks_consumer() {
    let dir = tempfile::tempdir().unwrap();
    let framework = framework_in(&dir);

    let a = framework
        .install(
            "file:a",
            &archive_bytes(&manifest(
                "org.loam.a",
                "1.0.0",
                None,
                &[("pkg", "1.0", "")],
                &[],
            )),
        )
        .await
        .unwrap();
    let b = framework
        .install(
            "file:b",
            &archive_bytes(&manifest(
                "org.loam.b",
                "1.0.0",
                None,
                &[],
                &[("pkg", "[1.0,2.0)", false)],
            )),
        )
        .await
        .unwrap();
    framework.resolve_all().await.unwrap();
    assert!(framework.wiring_of(b.id).is_some());

    // Watch for B's resolution failure after the refresh.
    #[derive(Default)]
    struct FailureWatch(Mutex<Vec<(u64, Option<String>)>>);
    impl EventListener for FailureWatch {
        fn on_event(&self, event: &Event) -> Result<(), EventError> {
            if event.topic == Topic::Lifecycle(LifecycleTopic::ResolutionFailed) {
                self.0
                    .lock()
                    .unwrap()
                    .push((event.source.id, event.cause.clone()));
            }
            Ok(())
        }
    }
    let watch = Arc::new(FailureWatch::default());
    framework
        .add_listener(
            ListenerFilter::kind(EventKind::Lifecycle),
            Arc::clone(&watch) as Arc<dyn EventListener>,
        )
        .await;

    // A now exports pkg@2.0 — outside B's [1.0,2.0).
    framework
        .update(
            a.id,
            &archive_bytes(&manifest(
                "org.loam.a",
                "1.1.0",
                None,
                &[("pkg", "2.0", "")],
                &[],
            )),
        )
        .await
        .unwrap();
    framework.refresh_modules(Some(&[a.id])).await.unwrap();
    framework.context().queue.flush().await;

    // B's old wire is gone and re-resolution failed it; A resolved.
    assert!(framework.wiring_of(b.id).is_none());
    assert_eq!(framework.state_of(b.id), Some(ModuleState::Installed));
    assert_eq!(framework.state_of(a.id), Some(ModuleState::Resolved));

    let failures = watch.0.lock().unwrap().clone();
    assert!(failures.iter().any(|(id, cause)| {
        *id == b.id && cause.as_deref().is_some_and(|c| c.contains("unmet"))
    }));
}

#[tokio::test]
async fn refresh_restarts_eager_dependents() {
    let dir = tempfile::tempdir().unwrap();
    let framework = framework_in(&dir);

    let provider = framework
        .install(
            "file:provider",
            &archive_bytes(&manifest(
                "org.loam.provider",
                "1.0.0",
                None,
                &[("pkg", "1.0", "")],
                &[],
            )),
        )
        .await
        .unwrap();
    let consumer = framework
        .install(
            "file:consumer",
            &archive_bytes(&manifest(
                "org.loam.consumer",
                "1.0.0",
                None,
                &[],
                &[("pkg", "[1.0,3.0)", false)],
            )),
        )
        .await
        .unwrap();

    framework.start(consumer.id).await.unwrap();
    assert_eq!(framework.state_of(consumer.id), Some(ModuleState::Active));

    // Refresh the provider; the consumer is dragged in, stopped, and
    // (being eager) restarted against the new wiring.
    framework
        .update(
            provider.id,
            &archive_bytes(&manifest(
                "org.loam.provider",
                "2.0.0",
                None,
                &[("pkg", "2.0", "")],
                &[],
            )),
        )
        .await
        .unwrap();
    framework.refresh_modules(Some(&[provider.id])).await.unwrap();

    assert_eq!(framework.state_of(consumer.id), Some(ModuleState::Active));
    let wiring = framework.wiring_of(consumer.id).unwrap();
    assert_eq!(wiring.wires[0].provider.id, provider.id);
    assert_eq!(
        wiring.wires[0].capability.version().to_string(),
        "2.0.0"
    );
}

#[tokio::test]
async fn unsatisfiable_sibling_does_not_block_batch() {
    let dir = tempfile::tempdir().unwrap();
    let framework = framework_in(&dir);

    let good = framework
        .install(
            "file:good",
            &archive_bytes(&manifest("org.loam.good", "1.0.0", None, &[], &[])),
        )
        .await
        .unwrap();
    let bad = framework
        .install(
            "file:bad",
            &archive_bytes(&manifest(
                "org.loam.bad",
                "1.0.0",
                None,
                &[],
                &[("nowhere", "[1.0,2.0)", false)],
            )),
        )
        .await
        .unwrap();

    framework.resolve_all().await.unwrap();

    assert_eq!(framework.state_of(good.id), Some(ModuleState::Resolved));
    assert_eq!(framework.state_of(bad.id), Some(ModuleState::Installed));
}

#[tokio::test]
async fn optional_import_resolves_without_provider() {
    let dir = tempfile::tempdir().unwrap();
    let framework = framework_in(&dir);

    let id = framework
        .install(
            "file:opt",
            &archive_bytes(&manifest(
                "org.loam.opt",
                "1.0.0",
                None,
                &[],
                &[("maybe", "[1.0,2.0)", true)],
            )),
        )
        .await
        .unwrap();

    framework.resolve_all().await.unwrap();
    assert_eq!(framework.state_of(id.id), Some(ModuleState::Resolved));
    assert!(framework.wiring_of(id.id).unwrap().is_empty());
}

#[tokio::test]
async fn repeated_resolution_adds_no_wires() {
    let dir = tempfile::tempdir().unwrap();
    let framework = framework_in(&dir);

    framework
        .install(
            "file:a",
            &archive_bytes(&manifest(
                "org.loam.a",
                "1.0.0",
                None,
                &[("pkg", "1.0", "")],
                &[],
            )),
        )
        .await
        .unwrap();
    let b = framework
        .install(
            "file:b",
            &archive_bytes(&manifest(
                "org.loam.b",
                "1.0.0",
                None,
                &[],
                &[("pkg", "1.0", false)],
            )),
        )
        .await
        .unwrap();

    framework.resolve_all().await.unwrap();
    let first = framework.wiring_of(b.id).unwrap();

    framework.resolve_all().await.unwrap();
    let second = framework.wiring_of(b.id).unwrap();

    // Identical wiring object: the second pass was a no-op.
    assert!(Arc::ptr_eq(&first, &second));
}

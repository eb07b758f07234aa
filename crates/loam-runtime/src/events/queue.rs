//! The asynchronous event queue.
//!
//! Producers enqueue; a single dedicated worker task delivers FIFO to
//! every matching subscriber. The worker detaches itself after an
//! idle timeout so an idle framework holds no task, and the next
//! `post` re-attaches a fresh one.
//!
//! ```text
//! post() ──► bounded mpsc ──► worker task ──► listener 1
//!                │ (idle timeout:             listener 2
//!                │  detach, drain,            ...
//!                ▼  next post re-attaches)
//! ```
//!
//! # Containment
//!
//! A listener returning an error is logged through the error path and
//! delivery continues with the remaining listeners; the poster never
//! learns about it. Events are immutable, so fan-out shares one
//! instance without copy-on-deliver.

use loam_event::{Event, EventError, EventListener, ListenerFilter};
use loam_types::{ErrorCode, ListenerId};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, trace};

/// One registered subscription.
struct Subscription {
    id: ListenerId,
    filter: ListenerFilter,
    listener: Arc<dyn EventListener>,
}

/// What travels on the channel.
enum QueueItem {
    Deliver(Event),
    /// Targeted delivery to one subscription (listener back-fill).
    DeliverTo(ListenerId, Event),
    /// Flush marker: acknowledged once every earlier item delivered.
    Flush(oneshot::Sender<()>),
}

struct QueueInner {
    capacity: usize,
    idle_timeout: Duration,
    /// Copy-on-write subscriber list: delivery clones the `Arc`, add
    /// and remove swap a new vector in.
    subscribers: RwLock<Arc<Vec<Arc<Subscription>>>>,
    /// The live sender, `None` while the worker is detached.
    sender: Mutex<Option<mpsc::Sender<QueueItem>>>,
}

/// Handle to the event queue; cheap to clone.
#[derive(Clone)]
pub struct EventQueue {
    inner: Arc<QueueInner>,
}

impl EventQueue {
    /// Creates a queue. No worker runs until the first post.
    #[must_use]
    pub fn new(capacity: usize, idle_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                capacity: capacity.max(1),
                idle_timeout,
                subscribers: RwLock::new(Arc::new(Vec::new())),
                sender: Mutex::new(None),
            }),
        }
    }

    /// Subscribes a listener; returns the id used to unsubscribe.
    pub fn subscribe(
        &self,
        filter: ListenerFilter,
        listener: Arc<dyn EventListener>,
    ) -> ListenerId {
        let id = ListenerId::new();
        let mut guard = self.inner.subscribers.write();
        let mut next: Vec<Arc<Subscription>> = guard.as_ref().clone();
        next.push(Arc::new(Subscription {
            id,
            filter,
            listener,
        }));
        *guard = Arc::new(next);
        trace!(listener = %id, "subscribed");
        id
    }

    /// Removes a subscription. Unknown ids are a no-op.
    pub fn unsubscribe(&self, id: ListenerId) {
        let mut guard = self.inner.subscribers.write();
        let next: Vec<Arc<Subscription>> = guard
            .as_ref()
            .iter()
            .filter(|s| s.id != id)
            .cloned()
            .collect();
        *guard = Arc::new(next);
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    /// Posts an event. Blocks the caller only for the enqueue itself
    /// (backpressure on a full queue); delivery happens on the worker.
    pub async fn post(&self, event: Event) {
        let mut item = QueueItem::Deliver(event);
        loop {
            let sender = self.attach();
            match sender.send(item).await {
                Ok(()) => return,
                Err(mpsc::error::SendError(back)) => {
                    // The worker detached between attach and send;
                    // clear the dead sender and retry.
                    self.clear_dead_sender(&sender);
                    item = back;
                }
            }
        }
    }

    /// Posts an event for exactly one subscription, still in FIFO
    /// order with everything else on the queue. Used for the service
    /// back-fill of late subscribers; other listeners never see it.
    pub async fn post_to(&self, target: ListenerId, event: Event) {
        let mut item = QueueItem::DeliverTo(target, event);
        loop {
            let sender = self.attach();
            match sender.send(item).await {
                Ok(()) => return,
                Err(mpsc::error::SendError(back)) => {
                    self.clear_dead_sender(&sender);
                    item = back;
                }
            }
        }
    }

    /// Non-blocking post.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::QueueFull`] when the bounded queue is at
    /// capacity.
    pub fn try_post(&self, event: Event) -> Result<(), EventError> {
        let mut item = QueueItem::Deliver(event);
        loop {
            let sender = self.attach();
            match sender.try_send(item) {
                Ok(()) => return Ok(()),
                Err(mpsc::error::TrySendError::Full(_)) => return Err(EventError::QueueFull),
                Err(mpsc::error::TrySendError::Closed(back)) => {
                    self.clear_dead_sender(&sender);
                    item = back;
                }
            }
        }
    }

    /// Waits until everything posted before this call is delivered.
    pub async fn flush(&self) {
        loop {
            let (tx, rx) = oneshot::channel();
            let sender = self.attach();
            match sender.send(QueueItem::Flush(tx)).await {
                Ok(()) => {
                    if rx.await.is_ok() {
                        return;
                    }
                    // Worker died mid-flush; retry.
                }
                Err(_) => self.clear_dead_sender(&sender),
            }
        }
    }

    /// Returns the live sender, spawning a fresh worker when detached.
    fn attach(&self) -> mpsc::Sender<QueueItem> {
        let mut slot = self.inner.sender.lock();
        if let Some(sender) = slot.as_ref() {
            if !sender.is_closed() {
                return sender.clone();
            }
        }
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        *slot = Some(tx.clone());
        let inner = Arc::clone(&self.inner);
        tokio::spawn(worker(inner, rx));
        debug!("event worker attached");
        tx
    }

    /// Drops the stored sender if it is the one that just failed.
    fn clear_dead_sender(&self, dead: &mpsc::Sender<QueueItem>) {
        let mut slot = self.inner.sender.lock();
        if let Some(current) = slot.as_ref() {
            if current.same_channel(dead) {
                *slot = None;
            }
        }
    }
}

/// The delivery worker: FIFO until idle for the configured timeout,
/// then detach (drain first so nothing enqueued is lost).
async fn worker(inner: Arc<QueueInner>, mut rx: mpsc::Receiver<QueueItem>) {
    loop {
        match tokio::time::timeout(inner.idle_timeout, rx.recv()).await {
            Ok(Some(item)) => handle(&inner, item),
            Ok(None) => break,
            Err(_) => {
                // Idle: detach. Clear the sender slot first so new
                // posts attach a fresh worker, then close and drain —
                // a racing post either reached the buffer (delivered
                // here) or failed its send and retries.
                {
                    let mut slot = inner.sender.lock();
                    *slot = None;
                }
                rx.close();
                while let Ok(item) = rx.try_recv() {
                    handle(&inner, item);
                }
                debug!("event worker detached after idle timeout");
                break;
            }
        }
    }
}

fn handle(inner: &QueueInner, item: QueueItem) {
    match item {
        QueueItem::Deliver(event) => deliver(inner, &event),
        QueueItem::DeliverTo(target, event) => {
            let subscribers = Arc::clone(&inner.subscribers.read());
            if let Some(subscription) = subscribers.iter().find(|s| s.id == target) {
                deliver_one(subscription, &event);
            }
        }
        QueueItem::Flush(ack) => {
            let _ = ack.send(());
        }
    }
}

fn deliver(inner: &QueueInner, event: &Event) {
    let subscribers = Arc::clone(&inner.subscribers.read());
    for subscription in subscribers.iter() {
        deliver_one(subscription, event);
    }
}

fn deliver_one(subscription: &Subscription, event: &Event) {
    if !subscription.filter.accepts(event) {
        return;
    }
    if let Err(err) = subscription.listener.on_event(event) {
        // Contained: log and keep delivering.
        error!(
            listener = %subscription.id,
            code = err.code(),
            error = %err,
            "listener failed during delivery"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_event::{EventKind, LifecycleTopic};
    use loam_types::{Filter, ModuleId, Version};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn module(name: &str) -> ModuleId {
        ModuleId::new(1, name, Version::new(1, 0, 0), format!("mem:{name}"))
    }

    fn queue() -> EventQueue {
        EventQueue::new(64, Duration::from_millis(50))
    }

    /// Collects delivered event topics in order.
    #[derive(Default)]
    struct Collector(std::sync::Mutex<Vec<String>>);

    impl EventListener for Collector {
        fn on_event(&self, event: &Event) -> Result<(), EventError> {
            self.0.lock().unwrap().push(event.topic.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn fifo_delivery_order() {
        let queue = queue();
        let collector = Arc::new(Collector::default());
        queue.subscribe(
            ListenerFilter::kind(EventKind::Lifecycle),
            Arc::clone(&collector) as Arc<dyn EventListener>,
        );

        for topic in [
            LifecycleTopic::Installed,
            LifecycleTopic::Resolved,
            LifecycleTopic::Started,
        ] {
            queue.post(Event::lifecycle(topic, module("a"))).await;
        }
        queue.flush().await;

        let seen = collector.0.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                "lifecycle/Installed",
                "lifecycle/Resolved",
                "lifecycle/Started"
            ]
        );
    }

    #[tokio::test]
    async fn kind_and_filter_gating() {
        let queue = queue();
        let all = Arc::new(Collector::default());
        let filtered = Arc::new(Collector::default());

        queue.subscribe(
            ListenerFilter::kind(EventKind::Lifecycle),
            Arc::clone(&all) as Arc<dyn EventListener>,
        );
        queue.subscribe(
            ListenerFilter::with_filter(
                EventKind::Lifecycle,
                Filter::parse("(module=b)").unwrap(),
            ),
            Arc::clone(&filtered) as Arc<dyn EventListener>,
        );

        queue
            .post(Event::lifecycle(LifecycleTopic::Started, module("a")))
            .await;
        queue
            .post(Event::lifecycle(LifecycleTopic::Started, module("b")))
            .await;
        queue.flush().await;

        assert_eq!(all.0.lock().unwrap().len(), 2);
        assert_eq!(filtered.0.lock().unwrap().len(), 1);
    }

    /// A listener that always fails.
    struct Failing;

    impl EventListener for Failing {
        fn on_event(&self, _event: &Event) -> Result<(), EventError> {
            Err(EventError::ListenerFailed("scripted".into()))
        }
    }

    #[tokio::test]
    async fn listener_failure_does_not_stop_delivery() {
        let queue = queue();
        let collector = Arc::new(Collector::default());

        // Failing listener subscribed first.
        queue.subscribe(
            ListenerFilter::kind(EventKind::Lifecycle),
            Arc::new(Failing) as Arc<dyn EventListener>,
        );
        queue.subscribe(
            ListenerFilter::kind(EventKind::Lifecycle),
            Arc::clone(&collector) as Arc<dyn EventListener>,
        );

        queue
            .post(Event::lifecycle(LifecycleTopic::Started, module("a")))
            .await;
        queue.flush().await;

        assert_eq!(collector.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn worker_detaches_and_reattaches() {
        let queue = EventQueue::new(8, Duration::from_millis(20));
        let counter = Arc::new(AtomicUsize::new(0));

        struct Counting(Arc<AtomicUsize>);
        impl EventListener for Counting {
            fn on_event(&self, _event: &Event) -> Result<(), EventError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        queue.subscribe(
            ListenerFilter::kind(EventKind::Lifecycle),
            Arc::new(Counting(Arc::clone(&counter))) as Arc<dyn EventListener>,
        );

        queue
            .post(Event::lifecycle(LifecycleTopic::Started, module("a")))
            .await;
        queue.flush().await;

        // Wait well past the idle timeout so the worker detaches.
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(queue.inner.sender.lock().is_none(), "worker should detach");

        // Posting re-attaches and delivers.
        queue
            .post(Event::lifecycle(LifecycleTopic::Stopped, module("a")))
            .await;
        queue.flush().await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let queue = queue();
        let collector = Arc::new(Collector::default());
        let id = queue.subscribe(
            ListenerFilter::kind(EventKind::Lifecycle),
            Arc::clone(&collector) as Arc<dyn EventListener>,
        );
        assert_eq!(queue.subscriber_count(), 1);

        queue.unsubscribe(id);
        assert_eq!(queue.subscriber_count(), 0);

        queue
            .post(Event::lifecycle(LifecycleTopic::Started, module("a")))
            .await;
        queue.flush().await;
        assert!(collector.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn try_post_reports_full_queue() {
        // Capacity 1 and a listener that blocks forever on the first
        // event would be fragile; instead, no worker is spawned by
        // try_post on a closed... simplest honest check: capacity 1
        // with events posted faster than the flush.
        let queue = EventQueue::new(1, Duration::from_secs(10));

        // Fill the buffer without a consumer keeping up: subscribe a
        // slow listener.
        struct Slow;
        impl EventListener for Slow {
            fn on_event(&self, _event: &Event) -> Result<(), EventError> {
                std::thread::sleep(Duration::from_millis(50));
                Ok(())
            }
        }
        queue.subscribe(
            ListenerFilter::kind(EventKind::Lifecycle),
            Arc::new(Slow) as Arc<dyn EventListener>,
        );

        // Saturate: with a single-slot buffer and a slow worker, some
        // try_post must eventually report Full.
        let mut saw_full = false;
        for _ in 0..64 {
            if let Err(EventError::QueueFull) =
                queue.try_post(Event::lifecycle(LifecycleTopic::Started, module("a")))
            {
                saw_full = true;
                break;
            }
        }
        assert!(saw_full);
        queue.flush().await;
    }
}

// Copyright 2025 Cowboy AI, LLC.

//! [`EventProcessor`]: the bounded dispatch queue and worker pool of §4.4.
//!
//! Grounded on the teacher's `EventHandler<E>` registration-and-dispatch
//! shape (`event_handler.rs`), generalized from a compile-time event enum
//! dispatched synchronously to a runtime glob-keyed registry dispatched by
//! a worker pool, since the fabric's event types are open (domain
//! extensions add more) and dispatch must not block the emitter.

use super::correlation::{CorrelationRule, CorrelationTracker};
use super::event::Event;
use super::glob;
use crate::clock::Clock;
use crate::config::EventsConfig;
use crate::context::Deadline;
use crate::errors::{DomainError, DomainResult};
use crate::gal::GraphStore;
use crate::model::PropertyMap;
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, warn};

/// A predicate keyed by event-type glob; events for which it returns false
/// are discarded before handler dispatch.
pub type EventFilter = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// A consumer invoked for each event matching its registered glob.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one event. Errors are caught by the pipeline, logged with
    /// event context, and do not stop dispatch to other handlers.
    async fn handle(&self, event: &Event) -> DomainResult<()>;
}

struct Registered<T> {
    pattern: String,
    item: T,
}

struct Shared {
    store: Arc<dyn GraphStore>,
    clock: Arc<dyn Clock>,
    filters: RwLock<Vec<Registered<EventFilter>>>,
    handlers: RwLock<Vec<Registered<Arc<dyn EventHandler>>>>,
    correlations: RwLock<Vec<(CorrelationRule, Mutex<CorrelationTracker>)>>,
    /// One dispatch queue per worker. `enqueue` always routes a given
    /// `event.source` to the same shard (hash of the source modulo
    /// `senders.len()`), so same-source events stay in arrival order even
    /// with `worker_count > 1` (§4.4: "events from a single emitting
    /// thread are dispatched in emission order").
    senders: Vec<mpsc::Sender<Event>>,
    stopped: AtomicBool,
    /// Events persisted-and-sent but not yet fully dispatched; `stop(true)`
    /// polls this down to zero before returning. Includes events fed back
    /// by correlation rules, so draining also waits out their dispatch.
    pending: AtomicU64,
    backpressure_wait: Duration,
}

/// The Event Pipeline's live handle: `Log`, registration, and lifecycle.
pub struct EventProcessor {
    shared: Arc<Shared>,
    workers: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

/// A started processor, returned by [`EventProcessor::start`].
pub type ProcessorHandle = Arc<EventProcessor>;

impl EventProcessor {
    /// Start the pipeline: allocate the bounded queue and spawn
    /// `config.worker_count` workers draining it.
    pub fn start(
        config: EventsConfig,
        store: Arc<dyn GraphStore>,
        clock: Arc<dyn Clock>,
    ) -> ProcessorHandle {
        let worker_count = config.worker_count.max(1);
        let shard_capacity = (config.queue_capacity / worker_count).max(1);

        let mut senders = Vec::with_capacity(worker_count);
        let mut receivers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let (sender, receiver) = mpsc::channel(shard_capacity);
            senders.push(sender);
            receivers.push(receiver);
        }

        let shared = Arc::new(Shared {
            store,
            clock,
            filters: RwLock::new(Vec::new()),
            handlers: RwLock::new(Vec::new()),
            correlations: RwLock::new(Vec::new()),
            senders,
            stopped: AtomicBool::new(false),
            pending: AtomicU64::new(0),
            backpressure_wait: Duration::from_millis(config.backpressure_wait_ms),
        });

        let mut workers = Vec::with_capacity(worker_count);
        for receiver in receivers {
            let shared = shared.clone();
            workers.push(tokio::spawn(async move {
                worker_loop(shared, receiver).await;
            }));
        }

        Arc::new(Self {
            shared,
            workers: std::sync::Mutex::new(workers),
        })
    }

    /// Register a filter under an event-type glob.
    pub async fn register_filter(&self, pattern: impl Into<String>, filter: EventFilter) {
        self.shared.filters.write().await.push(Registered {
            pattern: pattern.into(),
            item: filter,
        });
    }

    /// Register a handler under an event-type glob.
    pub async fn register_handler(
        &self,
        pattern: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) {
        self.shared.handlers.write().await.push(Registered {
            pattern: pattern.into(),
            item: handler,
        });
    }

    /// Register a correlation rule.
    pub async fn register_correlation_rule(&self, rule: CorrelationRule) {
        self.shared
            .correlations
            .write()
            .await
            .push((rule, Mutex::new(CorrelationTracker::default())));
    }

    /// `EventsNode.Log`: persist then enqueue. Blocks up to
    /// `backpressure_wait_ms` if the queue is full, then fails with
    /// `BackpressureExceeded`. Fails with `ProcessorStopped` once `Stop`
    /// has been called.
    pub async fn log(&self, deadline: &Deadline, event: Event) -> DomainResult<()> {
        if self.shared.stopped.load(Ordering::SeqCst) {
            return Err(DomainError::ProcessorStopped);
        }

        let properties = event_to_properties(&event);
        self.shared
            .store
            .create_node(deadline, "Event", properties)
            .await?;

        enqueue(&self.shared, event).await
    }

    /// `Stop(drain)`. When `drain = true`, lets every already-queued event
    /// finish dispatch (polling the in-flight count down to zero) before
    /// returning; when `false`, aborts workers immediately, discarding
    /// anything still queued or mid-dispatch.
    pub async fn stop(&self, drain: bool) {
        self.shared.stopped.store(true, Ordering::SeqCst);

        if drain {
            while self.shared.pending.load(Ordering::SeqCst) > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }

        let mut workers = self.workers.lock().expect("workers mutex poisoned");
        for worker in workers.drain(..) {
            worker.abort();
        }
    }
}

/// Which shard's queue `source` is always routed to, stable for the life
/// of the processor.
fn shard_for(senders_len: usize, source: &str) -> usize {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    (hasher.finish() as usize) % senders_len
}

async fn enqueue(shared: &Arc<Shared>, event: Event) -> DomainResult<()> {
    shared.pending.fetch_add(1, Ordering::SeqCst);
    let sender = &shared.senders[shard_for(shared.senders.len(), &event.source)];
    match tokio::time::timeout(shared.backpressure_wait, sender.send(event)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(_)) => {
            shared.pending.fetch_sub(1, Ordering::SeqCst);
            Err(DomainError::ProcessorStopped)
        }
        Err(_) => {
            shared.pending.fetch_sub(1, Ordering::SeqCst);
            Err(DomainError::BackpressureExceeded {
                waited_ms: shared.backpressure_wait.as_millis() as u64,
            })
        }
    }
}

async fn worker_loop(shared: Arc<Shared>, mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        dispatch(&shared, event).await;
        shared.pending.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn dispatch(shared: &Arc<Shared>, event: Event) {
    {
        let filters = shared.filters.read().await;
        for registered in filters.iter() {
            if glob::matches(&registered.pattern, &event.event_type) && !(registered.item)(&event) {
                return;
            }
        }
    }

    {
        let handlers = shared.handlers.read().await;
        for registered in handlers.iter() {
            if glob::matches(&registered.pattern, &event.event_type) {
                if let Err(e) = registered.item.handle(&event).await {
                    error!(
                        event_id = %event.id,
                        event_type = %event.event_type,
                        error = %e,
                        "event handler failed"
                    );
                }
            }
        }
    }

    let mut generated = Vec::new();
    {
        let correlations = shared.correlations.read().await;
        let now = shared.clock.now();
        for (rule, tracker) in correlations.iter() {
            let mut tracker = tracker.lock().await;
            if let Some(synthesized) = tracker.observe(rule, &event, now) {
                generated.push(synthesized);
            }
        }
    }

    for synthesized in generated {
        if let Err(e) = log_generated(shared, synthesized).await {
            warn!(error = %e, "failed to log correlated event");
        }
    }
}

async fn log_generated(shared: &Arc<Shared>, event: Event) -> DomainResult<()> {
    let properties = event_to_properties(&event);
    shared
        .store
        .create_node(&Deadline::none(), "Event", properties)
        .await?;
    enqueue(shared, event).await
}

fn event_to_properties(event: &Event) -> PropertyMap {
    let mut props = PropertyMap::new();
    props.insert("type".to_string(), serde_json::json!(event.event_type));
    props.insert(
        "timestamp".to_string(),
        serde_json::json!(event.timestamp.to_rfc3339()),
    );
    props.insert("source".to_string(), serde_json::json!(event.source));
    props.insert("metadata".to_string(), serde_json::json!(event.metadata));
    props.insert("related".to_string(), serde_json::json!(event.related));
    props
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::gal::InMemoryStore;
    use std::sync::Mutex as StdMutex;

    struct RecordingHandler {
        seen: Arc<StdMutex<Vec<String>>>,
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        async fn handle(&self, event: &Event) -> DomainResult<()> {
            self.seen.lock().unwrap().push(event.event_type.clone());
            Ok(())
        }
    }

    fn config() -> EventsConfig {
        EventsConfig {
            queue_capacity: 8,
            worker_count: 1,
            backpressure_wait_ms: 100,
        }
    }

    #[tokio::test]
    async fn log_dispatches_to_matching_handler() {
        let store: Arc<dyn GraphStore> = Arc::new(InMemoryStore::new());
        let processor = EventProcessor::start(config(), store, Arc::new(SystemClock));
        let seen = Arc::new(StdMutex::new(Vec::new()));
        processor
            .register_handler("agent.*", Arc::new(RecordingHandler { seen: seen.clone() }))
            .await;

        let deadline = Deadline::none();
        processor
            .log(
                &deadline,
                Event::new("agent.action", "agent-1", chrono::Utc::now()),
            )
            .await
            .unwrap();

        processor.stop(true).await;
        assert_eq!(seen.lock().unwrap().as_slice(), ["agent.action"]);
    }

    #[tokio::test]
    async fn filter_returning_false_suppresses_handler() {
        let store: Arc<dyn GraphStore> = Arc::new(InMemoryStore::new());
        let processor = EventProcessor::start(config(), store, Arc::new(SystemClock));
        let seen = Arc::new(StdMutex::new(Vec::new()));
        processor
            .register_filter("agent.*", Arc::new(|_: &Event| false))
            .await;
        processor
            .register_handler("agent.*", Arc::new(RecordingHandler { seen: seen.clone() }))
            .await;

        let deadline = Deadline::none();
        processor
            .log(
                &deadline,
                Event::new("agent.action", "agent-1", chrono::Utc::now()),
            )
            .await
            .unwrap();

        processor.stop(true).await;
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn log_after_stop_is_rejected() {
        let store: Arc<dyn GraphStore> = Arc::new(InMemoryStore::new());
        let processor = EventProcessor::start(config(), store, Arc::new(SystemClock));
        processor.stop(true).await;

        let deadline = Deadline::none();
        let err = processor
            .log(
                &deadline,
                Event::new("agent.action", "agent-1", chrono::Utc::now()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ProcessorStopped));
    }

    #[tokio::test]
    async fn same_source_events_dispatch_in_emission_order_with_multiple_workers() {
        let store: Arc<dyn GraphStore> = Arc::new(InMemoryStore::new());
        let processor = EventProcessor::start(
            EventsConfig {
                queue_capacity: 64,
                worker_count: 8,
                backpressure_wait_ms: 100,
            },
            store,
            Arc::new(SystemClock),
        );
        let seen = Arc::new(StdMutex::new(Vec::new()));
        processor
            .register_handler("task.*", Arc::new(RecordingHandler { seen: seen.clone() }))
            .await;

        let deadline = Deadline::none();
        for i in 0..20 {
            processor
                .log(
                    &deadline,
                    Event::new(format!("task.step.{i}"), "agent-1", chrono::Utc::now()),
                )
                .await
                .unwrap();
        }

        processor.stop(true).await;
        let expected: Vec<String> = (0..20).map(|i| format!("task.step.{i}")).collect();
        assert_eq!(*seen.lock().unwrap(), expected);
    }
}

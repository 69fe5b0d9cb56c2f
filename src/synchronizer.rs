// Copyright 2025 Cowboy AI, LLC.

//! The Synchronizer (§4.7): schedules and runs [`crate::dkm::DualKnowledgeManager::synchronize`]
//! jobs, one per `(rule, source, target)` triple, from three trigger kinds —
//! a fixed period, an Event Pipeline glob, or `TriggerNow`.
//!
//! Grounded on [`crate::events::EventProcessor`]'s bounded-queue-plus-worker-pool
//! shape (a `Shared` state block behind `Arc`, workers draining a queue under
//! a `stopped` flag), generalized from an unordered mpsc channel to a
//! priority queue ordered by `(priority, enqueue_time)`, since scheduled
//! synchronization jobs compete for a single worker and §4.7 requires
//! priority to break ties.

use crate::clock::Clock;
use crate::context::Deadline;
use crate::dkm::{Cadence, DualKnowledgeManager, SyncOutcome};
use crate::errors::DomainResult;
use crate::events::{Event as PipelineEvent, EventHandler, ProcessorHandle};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::error;

/// Identifies one synchronization job: a rule run between a specific source
/// and target Managed KG.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey {
    /// The [`crate::dkm::SynchronizationRule`] name.
    pub rule_name: String,
    /// Source Managed KG name.
    pub source_kg: String,
    /// Target Managed KG name.
    pub target_kg: String,
}

impl JobKey {
    /// Build a job key.
    pub fn new(
        rule_name: impl Into<String>,
        source_kg: impl Into<String>,
        target_kg: impl Into<String>,
    ) -> Self {
        Self {
            rule_name: rule_name.into(),
            source_kg: source_kg.into(),
            target_kg: target_kg.into(),
        }
    }
}

/// A declared schedule for one job: what triggers it and at what priority.
#[derive(Debug, Clone)]
pub struct JobSpec {
    /// The job's identity.
    pub key: JobKey,
    /// What triggers runs of this job beyond `TriggerNow`.
    pub cadence: Cadence,
    /// Priority; higher runs first when multiple jobs are ready.
    pub priority: i32,
}

/// The outcome category of the most recent run of a job, matching §4.7's
/// status vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunResult {
    /// Completed with no per-item errors.
    Ok,
    /// Completed, but some candidates recorded errors.
    Partial,
    /// The `synchronize` call itself failed (e.g. unknown KG or rule).
    Failed,
}

/// Live status of one job, updated after each run.
#[derive(Debug, Clone, Default)]
pub struct JobStatus {
    /// When the most recent run started.
    pub last_run_started_at: Option<chrono::DateTime<chrono::Utc>>,
    /// How long the most recent run took.
    pub last_run_duration: Option<std::time::Duration>,
    /// Category of the most recent run's result.
    pub last_run_result: Option<RunResult>,
    /// Counters from the most recent [`SyncOutcome`].
    pub items_considered: u64,
    /// See [`JobStatus::items_considered`].
    pub items_applied: u64,
    /// See [`JobStatus::items_considered`].
    pub items_vetoed: u64,
    /// See [`JobStatus::items_considered`].
    pub items_deferred: u64,
    /// Message from the most recent failure, if any.
    pub last_error: Option<String>,
}

#[derive(Debug, Clone)]
struct QueueEntry {
    key: JobKey,
    priority: i32,
    enqueued_at: Instant,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.enqueued_at == other.enqueued_at
    }
}
impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    /// Higher priority sorts first; among equal priorities, the
    /// earlier-enqueued entry sorts first. `BinaryHeap` is a max-heap, so
    /// "sorts first" means "compares greater".
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.enqueued_at.cmp(&self.enqueued_at))
    }
}

struct Shared {
    dkm: Arc<DualKnowledgeManager>,
    clock: Arc<dyn Clock>,
    specs: RwLock<HashMap<JobKey, JobSpec>>,
    statuses: RwLock<HashMap<JobKey, JobStatus>>,
    queue: Mutex<BinaryHeap<QueueEntry>>,
    in_flight: Mutex<HashSet<JobKey>>,
    dirty: Mutex<HashSet<JobKey>>,
    notify: Notify,
    paused: AtomicBool,
    stopped: AtomicBool,
}

/// The Synchronizer's live handle: scheduling, triggering, and lifecycle.
pub struct Synchronizer {
    shared: Arc<Shared>,
    worker: std::sync::Mutex<Option<JoinHandle<()>>>,
    tickers: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl Synchronizer {
    /// Start the Synchronizer: spawn the single worker that drains the
    /// priority queue.
    pub fn start(dkm: Arc<DualKnowledgeManager>, clock: Arc<dyn Clock>) -> Arc<Self> {
        let shared = Arc::new(Shared {
            dkm,
            clock,
            specs: RwLock::new(HashMap::new()),
            statuses: RwLock::new(HashMap::new()),
            queue: Mutex::new(BinaryHeap::new()),
            in_flight: Mutex::new(HashSet::new()),
            dirty: Mutex::new(HashSet::new()),
            notify: Notify::new(),
            paused: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        });

        let worker_shared = shared.clone();
        let worker = tokio::spawn(async move {
            worker_loop(worker_shared).await;
        });

        Arc::new(Self {
            shared,
            worker: std::sync::Mutex::new(Some(worker)),
            tickers: std::sync::Mutex::new(Vec::new()),
        })
    }

    /// Declare a job. If `cadence` is [`Cadence::Scheduled`], spawns a
    /// ticker task that enqueues it on that period. If [`Cadence::OnEvent`],
    /// registers a handler on `events` that enqueues it whenever a matching
    /// event is logged. [`Cadence::Manual`] registers the spec without any
    /// background trigger; only `trigger_now` runs it.
    pub async fn schedule(&self, spec: JobSpec, events: Option<&ProcessorHandle>) {
        self.shared
            .specs
            .write()
            .await
            .insert(spec.key.clone(), spec.clone());

        match &spec.cadence {
            Cadence::Scheduled(period) => {
                let shared = self.shared.clone();
                let key = spec.key.clone();
                let priority = spec.priority;
                let period = *period;
                let ticker = tokio::spawn(async move {
                    loop {
                        tokio::time::sleep(period).await;
                        if shared.stopped.load(AtomicOrdering::SeqCst) {
                            return;
                        }
                        enqueue(&shared, key.clone(), priority).await;
                    }
                });
                self.tickers.lock().expect("tickers mutex poisoned").push(ticker);
            }
            Cadence::OnEvent(pattern) => {
                if let Some(events) = events {
                    let shared = self.shared.clone();
                    events
                        .register_handler(
                            pattern.clone(),
                            Arc::new(TriggerOnEvent {
                                shared,
                                key: spec.key.clone(),
                                priority: spec.priority,
                            }),
                        )
                        .await;
                }
            }
            Cadence::Manual => {}
        }
    }

    /// `TriggerNow(rule, source, target)`: enqueue a job outside its
    /// declared cadence, at the priority it was scheduled with (or `0` if
    /// never scheduled).
    pub async fn trigger_now(&self, key: JobKey) {
        let priority = self
            .shared
            .specs
            .read()
            .await
            .get(&key)
            .map(|spec| spec.priority)
            .unwrap_or(0);
        enqueue(&self.shared, key, priority).await;
    }

    /// Current status of a job, if it has ever run or is scheduled.
    pub async fn status(&self, key: &JobKey) -> Option<JobStatus> {
        self.shared.statuses.read().await.get(key).cloned()
    }

    /// `Pause`: stop dispatching new jobs. Jobs already running finish
    /// normally.
    pub fn pause(&self) {
        self.shared.paused.store(true, AtomicOrdering::SeqCst);
    }

    /// `Resume`: resume dispatching queued jobs.
    pub fn resume(&self) {
        self.shared.paused.store(false, AtomicOrdering::SeqCst);
        self.shared.notify.notify_one();
    }

    /// `Cancel(key)`: drop any queued (not yet running) entries for `key`.
    /// A run already in flight is not interrupted.
    pub async fn cancel(&self, key: &JobKey) {
        let mut queue = self.shared.queue.lock().await;
        let remaining: BinaryHeap<QueueEntry> =
            queue.drain().filter(|entry| &entry.key != key).collect();
        *queue = remaining;
        self.shared.dirty.lock().await.remove(key);
    }

    /// `Drain`: wait until the queue is empty and no job is in flight.
    pub async fn drain(&self) {
        loop {
            let queue_empty = self.shared.queue.lock().await.is_empty();
            let none_in_flight = self.shared.in_flight.lock().await.is_empty();
            if queue_empty && none_in_flight {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }

    /// Stop the Synchronizer: halt the worker and every scheduled ticker.
    /// Queued jobs are discarded.
    pub async fn stop(&self) {
        self.shared.stopped.store(true, AtomicOrdering::SeqCst);
        self.shared.notify.notify_one();

        if let Some(worker) = self.worker.lock().expect("worker mutex poisoned").take() {
            worker.abort();
        }
        for ticker in self.tickers.lock().expect("tickers mutex poisoned").drain(..) {
            ticker.abort();
        }
    }
}

struct TriggerOnEvent {
    shared: Arc<Shared>,
    key: JobKey,
    priority: i32,
}

#[async_trait]
impl EventHandler for TriggerOnEvent {
    async fn handle(&self, _event: &PipelineEvent) -> DomainResult<()> {
        enqueue(&self.shared, self.key.clone(), self.priority).await;
        Ok(())
    }
}

async fn enqueue(shared: &Arc<Shared>, key: JobKey, priority: i32) {
    {
        let in_flight = shared.in_flight.lock().await;
        if in_flight.contains(&key) {
            shared.dirty.lock().await.insert(key);
            return;
        }
    }

    shared.queue.lock().await.push(QueueEntry {
        key,
        priority,
        enqueued_at: Instant::now(),
    });
    shared.notify.notify_one();
}

async fn worker_loop(shared: Arc<Shared>) {
    loop {
        if shared.stopped.load(AtomicOrdering::SeqCst) {
            return;
        }
        if shared.paused.load(AtomicOrdering::SeqCst) {
            shared.notify.notified().await;
            continue;
        }

        let entry = shared.queue.lock().await.pop();
        let Some(entry) = entry else {
            shared.notify.notified().await;
            continue;
        };

        shared.in_flight.lock().await.insert(entry.key.clone());
        run_job(&shared, &entry.key).await;
        shared.in_flight.lock().await.remove(&entry.key);

        if shared.dirty.lock().await.remove(&entry.key) {
            enqueue(&shared, entry.key, entry.priority).await;
        }
    }
}

async fn run_job(shared: &Arc<Shared>, key: &JobKey) {
    let started_at = shared.clock.now();
    let started = Instant::now();
    let deadline = Deadline::none();

    let result = shared
        .dkm
        .synchronize(&deadline, &key.source_kg, &key.target_kg, &key.rule_name, None)
        .await;

    let duration = started.elapsed();
    let status = match result {
        Ok(outcome) => status_from_outcome(started_at, duration, outcome),
        Err(e) => {
            error!(rule = %key.rule_name, source = %key.source_kg, target = %key.target_kg, error = %e, "synchronization job failed");
            JobStatus {
                last_run_started_at: Some(started_at),
                last_run_duration: Some(duration),
                last_run_result: Some(RunResult::Failed),
                last_error: Some(e.to_string()),
                ..Default::default()
            }
        }
    };

    shared.statuses.write().await.insert(key.clone(), status);
}

fn status_from_outcome(
    started_at: chrono::DateTime<chrono::Utc>,
    duration: std::time::Duration,
    outcome: SyncOutcome,
) -> JobStatus {
    let result = if outcome.is_ok() {
        RunResult::Ok
    } else {
        RunResult::Partial
    };
    JobStatus {
        last_run_started_at: Some(started_at),
        last_run_duration: Some(duration),
        last_run_result: Some(result),
        items_considered: outcome.items_considered,
        items_applied: outcome.items_applied,
        items_vetoed: outcome.items_vetoed,
        items_deferred: outcome.items_deferred,
        last_error: outcome.errors.first().cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;
    use crate::dkm::{KgKind, SchemaMapping, SyncDirection, SynchronizationRule};
    use crate::entity::EntityId;
    use crate::gal::{GraphStore, InMemoryStore};
    use crate::model::PropertyMap;
    use crate::schema::SchemaRegistry;
    use chrono::Utc;

    async fn dkm_with_one_rule() -> (Arc<DualKnowledgeManager>, Arc<dyn GraphStore>, JobKey) {
        let registry: Arc<dyn GraphStore> = Arc::new(InMemoryStore::new());
        let dkm = Arc::new(DualKnowledgeManager::new(
            registry,
            Arc::new(SchemaRegistry::with_core_schema()),
            Arc::new(TestClock::at(Utc::now())),
            None,
        ));
        let deadline = Deadline::none();
        let local: Arc<dyn GraphStore> = Arc::new(InMemoryStore::new());
        let global: Arc<dyn GraphStore> = Arc::new(InMemoryStore::new());
        dkm.create_managed_kg(&deadline, "local", KgKind::Local, "", local.clone())
            .await
            .unwrap();
        dkm.create_managed_kg(&deadline, "global", KgKind::Global, "", global)
            .await
            .unwrap();
        dkm.register_mapping(
            &deadline,
            SchemaMapping::identity("component-mapping", "Component"),
            &["local", "global"],
        )
        .await
        .unwrap();
        dkm.register_rule(
            &deadline,
            SynchronizationRule {
                id: EntityId::new(),
                name: "promote-components".to_string(),
                direction: SyncDirection::LocalToGlobal,
                scope_label: "Component".to_string(),
                predicate: None,
                cadence: Cadence::Manual,
                priority: 5,
            },
            &["local", "global"],
        )
        .await
        .unwrap();

        (
            dkm,
            local,
            JobKey::new("promote-components", "local", "global"),
        )
    }

    #[tokio::test]
    async fn trigger_now_runs_job_and_records_ok_status() {
        let (dkm, local, key) = dkm_with_one_rule().await;
        local
            .create_node(&Deadline::none(), "Component", PropertyMap::new())
            .await
            .unwrap();

        let sync = Synchronizer::start(dkm, Arc::new(TestClock::at(Utc::now())));
        sync.schedule(
            JobSpec {
                key: key.clone(),
                cadence: Cadence::Manual,
                priority: 5,
            },
            None,
        )
        .await;
        sync.trigger_now(key.clone()).await;
        sync.drain().await;

        let status = sync.status(&key).await.unwrap();
        assert_eq!(status.last_run_result, Some(RunResult::Ok));
        assert_eq!(status.items_applied, 1);
        sync.stop().await;
    }

    #[tokio::test]
    async fn pause_prevents_dispatch_until_resumed() {
        let (dkm, _local, key) = dkm_with_one_rule().await;
        let sync = Synchronizer::start(dkm, Arc::new(TestClock::at(Utc::now())));
        sync.schedule(
            JobSpec {
                key: key.clone(),
                cadence: Cadence::Manual,
                priority: 0,
            },
            None,
        )
        .await;

        sync.pause();
        sync.trigger_now(key.clone()).await;
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        assert!(sync.status(&key).await.is_none());

        sync.resume();
        sync.drain().await;
        assert!(sync.status(&key).await.is_some());
        sync.stop().await;
    }

    #[tokio::test]
    async fn cancel_drops_queued_job_before_it_runs() {
        let (dkm, _local, key) = dkm_with_one_rule().await;
        let sync = Synchronizer::start(dkm, Arc::new(TestClock::at(Utc::now())));
        sync.schedule(
            JobSpec {
                key: key.clone(),
                cadence: Cadence::Manual,
                priority: 0,
            },
            None,
        )
        .await;

        sync.pause();
        sync.trigger_now(key.clone()).await;
        sync.cancel(&key).await;
        sync.resume();
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;

        assert!(sync.status(&key).await.is_none());
        sync.stop().await;
    }
}

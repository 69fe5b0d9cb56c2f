// Copyright 2025 Cowboy AI, LLC.

//! The fabric's outward-facing surface (§5): a three-phase lifecycle
//! (`Init` → `Start` → `Stop`), the event surface (`Log`/`Subscribe`), the
//! knowledge surface (typed repositories plus the generic relationship
//! repo), and the memory surface.
//!
//! Grounded on the teacher's top-level `lib.rs` composition root, which
//! wires a store, a read model, and a command bus behind one crate-level
//! entry point; generalized here into an explicit typestate so the GAL
//! pool, Schema Registry bootstrap, Event Pipeline workers, and
//! Synchronizer come up — and drain down, in reverse — in a fixed order
//! rather than whenever a caller happens to touch them.

use crate::clock::{Clock, SystemClock};
use crate::config::{FabricConfig, Neo4jConfig, PoolConfig};
use crate::context::Deadline;
use crate::dkm::{DualKnowledgeManager, KgKind};
use crate::embedding::{EmbeddingProvider, NoopEmbeddingProvider};
use crate::errors::DomainResult;
use crate::events::{Event, EventHandler, EventProcessor, ProcessorHandle};
use crate::gal::{ConnectionPool, GraphBackend, GraphStore, Neo4jBackend, Neo4jStore};
use crate::memory::AssociativeMemory;
use crate::repositories::{
    AgentRepo, ComponentRepo, DecisionRepo, DomainRepo, ImplementationRepo, PatternRepo,
    ProjectRepo, RelationshipRepo, Repository, RequirementRepo,
};
use crate::schema::SchemaRegistry;
use crate::synchronizer::Synchronizer;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, instrument, warn};

/// Name the local (per-agent) Managed KG is registered under when dual mode
/// is enabled.
pub const LOCAL_KG: &str = "local";
/// Name the shared Managed KG is registered under when dual mode is enabled.
pub const GLOBAL_KG: &str = "global";

/// `Init(config)`: validates configuration and prepares the pieces that
/// need no I/O. Holds nothing connected yet — [`FabricInit::start`] is the
/// phase that opens backends and spawns workers.
pub struct FabricInit {
    config: FabricConfig,
    schema: Arc<SchemaRegistry>,
    clock: Arc<dyn Clock>,
}

/// `Init(config)`.
pub fn init(config: FabricConfig) -> DomainResult<FabricInit> {
    config.validate()?;
    Ok(FabricInit {
        config,
        schema: Arc::new(SchemaRegistry::with_core_schema()),
        clock: Arc::new(SystemClock),
    })
}

impl FabricInit {
    /// Use a specific clock instead of [`SystemClock`] (tests, deterministic
    /// replay).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register additional node labels under a domain namespace before
    /// `Start` bootstraps the backend.
    pub fn extend_schema(
        mut self,
        domain_name: &str,
        nodes: Vec<crate::schema::NodeSchema>,
    ) -> DomainResult<Self> {
        Arc::get_mut(&mut self.schema)
            .expect("schema not yet shared before start")
            .extend_for_domain(domain_name, nodes)?;
        Ok(self)
    }

    /// `Start()`: open the GAL pool(s), issue the Schema Registry's
    /// bootstrap statements, start the Event Pipeline's worker pool, and —
    /// if a shared backend is configured — the Dual Knowledge Manager and
    /// Synchronizer.
    #[instrument(skip(self))]
    pub async fn start(self) -> DomainResult<KnowledgeFabric> {
        let primary_store = open_store(&self.config.neo4j, &self.config.pool, &self.schema).await?;
        info!("primary graph backend connected");

        let shared_store = match &self.config.neo4j_shared {
            Some(shared_cfg) => {
                let store = open_store(shared_cfg, &self.config.pool, &self.schema).await?;
                info!("shared graph backend connected");
                Some(store)
            }
            None => None,
        };

        let events = EventProcessor::start(
            self.config.events,
            primary_store.clone(),
            self.clock.clone(),
        );

        let embedding: Arc<dyn EmbeddingProvider> = match &self.config.embedding_provider {
            crate::config::EmbeddingProviderKind::None => Arc::new(NoopEmbeddingProvider),
            crate::config::EmbeddingProviderKind::Named(name) => {
                warn!(
                    provider = %name,
                    "named embedding provider is not wired at this layer, falling back to noop"
                );
                Arc::new(NoopEmbeddingProvider)
            }
        };

        let (dkm, synchronizer) = match &shared_store {
            Some(shared_store) => {
                let manager = Arc::new(DualKnowledgeManager::new(
                    primary_store.clone(),
                    self.schema.clone(),
                    self.clock.clone(),
                    Some(events.clone()),
                ));
                let deadline = Deadline::none();
                manager
                    .create_managed_kg(
                        &deadline,
                        LOCAL_KG,
                        KgKind::Local,
                        "primary per-agent knowledge graph",
                        primary_store.clone(),
                    )
                    .await?;
                manager
                    .create_managed_kg(
                        &deadline,
                        GLOBAL_KG,
                        KgKind::Global,
                        "shared cross-agent knowledge graph",
                        shared_store.clone(),
                    )
                    .await?;
                let synchronizer = Synchronizer::start(manager.clone(), self.clock.clone());
                (Some(manager), Some(synchronizer))
            }
            None => (None, None),
        };

        let memory = AssociativeMemory::new(
            primary_store.clone(),
            self.clock.clone(),
            embedding,
            self.config.memory,
        );

        Ok(KnowledgeFabric {
            schema: self.schema.clone(),
            clock: self.clock.clone(),
            primary_store: primary_store.clone(),
            shared_store,
            events,
            memory,
            dkm,
            synchronizer,
            domains: Repository::new(primary_store.clone(), self.schema.clone(), self.clock.clone()),
            projects: Repository::new(primary_store.clone(), self.schema.clone(), self.clock.clone()),
            components: Repository::new(primary_store.clone(), self.schema.clone(), self.clock.clone()),
            requirements: Repository::new(primary_store.clone(), self.schema.clone(), self.clock.clone()),
            implementations: Repository::new(
                primary_store.clone(),
                self.schema.clone(),
                self.clock.clone(),
            ),
            patterns: Repository::new(primary_store.clone(), self.schema.clone(), self.clock.clone()),
            decisions: Repository::new(primary_store.clone(), self.schema.clone(), self.clock.clone()),
            agents: Repository::new(primary_store.clone(), self.schema.clone(), self.clock.clone()),
            relationships: RelationshipRepo::new(primary_store, self.schema),
        })
    }
}

async fn open_store(
    config: &Neo4jConfig,
    pool_config: &PoolConfig,
    schema: &SchemaRegistry,
) -> DomainResult<Arc<dyn GraphStore>> {
    let max_retry_time = Duration::from_millis(pool_config.max_retry_time_ms);
    let backend: Arc<dyn GraphBackend> = Arc::new(Neo4jBackend::open(config, max_retry_time).await?);

    let deadline = Deadline::none();
    for statement in schema.bootstrap_statements() {
        backend
            .query(&deadline, &statement.0, HashMap::new(), &[])
            .await?;
    }

    let pool = ConnectionPool::new(backend, pool_config.size, pool_config.wait_ms);
    Ok(Arc::new(Neo4jStore::new(pool)))
}

/// A started fabric: every collaborator wired, workers running.
pub struct KnowledgeFabric {
    schema: Arc<SchemaRegistry>,
    clock: Arc<dyn Clock>,
    primary_store: Arc<dyn GraphStore>,
    shared_store: Option<Arc<dyn GraphStore>>,
    events: ProcessorHandle,
    memory: AssociativeMemory,
    dkm: Option<Arc<DualKnowledgeManager>>,
    synchronizer: Option<Arc<Synchronizer>>,
    domains: DomainRepo,
    projects: ProjectRepo,
    components: ComponentRepo,
    requirements: RequirementRepo,
    implementations: ImplementationRepo,
    patterns: PatternRepo,
    decisions: DecisionRepo,
    agents: AgentRepo,
    relationships: RelationshipRepo,
}

#[cfg(feature = "test-utils")]
impl KnowledgeFabric {
    /// Build a fabric directly over an already-open store, bypassing
    /// `FabricInit::start`'s Neo4j dial-out. For integration tests that
    /// exercise the facade against [`crate::gal::InMemoryStore`] or a mock
    /// [`crate::gal::GraphBackend`].
    pub fn for_testing(
        primary: Arc<dyn GraphStore>,
        shared: Option<Arc<dyn GraphStore>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let schema = Arc::new(SchemaRegistry::with_core_schema());
        let events = EventProcessor::start(
            crate::config::EventsConfig {
                queue_capacity: 256,
                worker_count: 1,
                backpressure_wait_ms: 100,
            },
            primary.clone(),
            clock.clone(),
        );
        let memory = AssociativeMemory::new(
            primary.clone(),
            clock.clone(),
            Arc::new(NoopEmbeddingProvider),
            crate::config::MemoryConfig::default(),
        );
        Self {
            schema: schema.clone(),
            clock: clock.clone(),
            primary_store: primary.clone(),
            shared_store: shared,
            events,
            memory,
            dkm: None,
            synchronizer: None,
            domains: Repository::new(primary.clone(), schema.clone(), clock.clone()),
            projects: Repository::new(primary.clone(), schema.clone(), clock.clone()),
            components: Repository::new(primary.clone(), schema.clone(), clock.clone()),
            requirements: Repository::new(primary.clone(), schema.clone(), clock.clone()),
            implementations: Repository::new(primary.clone(), schema.clone(), clock.clone()),
            patterns: Repository::new(primary.clone(), schema.clone(), clock.clone()),
            decisions: Repository::new(primary.clone(), schema.clone(), clock.clone()),
            agents: Repository::new(primary.clone(), schema.clone(), clock.clone()),
            relationships: RelationshipRepo::new(primary, schema),
        }
    }

    /// Enable dual-knowledge mode on a fabric built via [`Self::for_testing`]:
    /// registers its primary store as [`LOCAL_KG`] and `shared` (or the
    /// primary store again, if `shared` is `None`) as [`GLOBAL_KG`].
    pub async fn with_dkm_for_testing(mut self) -> DomainResult<Self> {
        let manager = Arc::new(DualKnowledgeManager::new(
            self.primary_store.clone(),
            self.schema.clone(),
            self.clock.clone(),
            Some(self.events.clone()),
        ));
        let deadline = Deadline::none();
        let global_store = self.shared_store.clone().unwrap_or_else(|| self.primary_store.clone());
        manager
            .create_managed_kg(
                &deadline,
                LOCAL_KG,
                KgKind::Local,
                "test-local knowledge graph",
                self.primary_store.clone(),
            )
            .await?;
        manager
            .create_managed_kg(
                &deadline,
                GLOBAL_KG,
                KgKind::Global,
                "test-global knowledge graph",
                global_store,
            )
            .await?;
        self.dkm = Some(manager);
        Ok(self)
    }
}

struct ForwardingHandler {
    sender: mpsc::Sender<Event>,
}

#[async_trait]
impl EventHandler for ForwardingHandler {
    async fn handle(&self, event: &Event) -> DomainResult<()> {
        // A full or closed receiver just means nobody is listening anymore;
        // dropping the event here is correct, not an error.
        let _ = self.sender.send(event.clone()).await;
        Ok(())
    }
}

impl KnowledgeFabric {
    /// The Schema Registry in effect.
    pub fn schema(&self) -> &Arc<SchemaRegistry> {
        &self.schema
    }

    /// The clock driving timestamps across this fabric.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The primary (local/per-agent) graph store.
    pub fn primary_store(&self) -> &Arc<dyn GraphStore> {
        &self.primary_store
    }

    /// The shared (global) graph store, if dual-knowledge mode is active.
    pub fn shared_store(&self) -> Option<&Arc<dyn GraphStore>> {
        self.shared_store.as_ref()
    }

    /// The Dual Knowledge Manager, if dual-knowledge mode is active.
    pub fn dkm(&self) -> Option<&Arc<DualKnowledgeManager>> {
        self.dkm.as_ref()
    }

    /// The Synchronizer, if dual-knowledge mode is active.
    pub fn synchronizer(&self) -> Option<&Arc<Synchronizer>> {
        self.synchronizer.as_ref()
    }

    /// The associative memory subsystem (§4.5).
    pub fn memory(&self) -> &AssociativeMemory {
        &self.memory
    }

    /// `Domain` repository.
    pub fn domains(&self) -> &DomainRepo {
        &self.domains
    }

    /// `Project` repository.
    pub fn projects(&self) -> &ProjectRepo {
        &self.projects
    }

    /// `Component` repository.
    pub fn components(&self) -> &ComponentRepo {
        &self.components
    }

    /// `Requirement` repository.
    pub fn requirements(&self) -> &RequirementRepo {
        &self.requirements
    }

    /// `Implementation` repository.
    pub fn implementations(&self) -> &ImplementationRepo {
        &self.implementations
    }

    /// `Pattern` repository.
    pub fn patterns(&self) -> &PatternRepo {
        &self.patterns
    }

    /// `Decision` repository.
    pub fn decisions(&self) -> &DecisionRepo {
        &self.decisions
    }

    /// `Agent` repository.
    pub fn agents(&self) -> &AgentRepo {
        &self.agents
    }

    /// The generic relationship repository.
    pub fn relationships(&self) -> &RelationshipRepo {
        &self.relationships
    }

    /// `EventsNode.Log`.
    pub async fn log_event(&self, deadline: &Deadline, event: Event) -> DomainResult<()> {
        self.events.log(deadline, event).await
    }

    /// Register a correlation rule on the Event Pipeline (§4.4 step 3).
    pub async fn register_correlation_rule(&self, rule: crate::events::CorrelationRule) {
        self.events.register_correlation_rule(rule).await
    }

    /// `EventsNode.Subscribe(typeGlob)`: a stream of events matching the
    /// glob, fed from a dedicated handler registered on the Event Pipeline.
    /// Dropping the returned stream deregisters nothing explicitly — the
    /// handler simply stops finding a live receiver and its sends become
    /// silent no-ops.
    pub async fn subscribe(&self, type_glob: impl Into<String>) -> ReceiverStream<Event> {
        let (sender, receiver) = mpsc::channel(64);
        self.events
            .register_handler(type_glob, Arc::new(ForwardingHandler { sender }))
            .await;
        ReceiverStream::new(receiver)
    }

    /// `Stop()`: drain the Synchronizer, then the Event Pipeline, in the
    /// reverse of `Start`'s bring-up order. Store pools release their own
    /// resources on drop.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        if let Some(synchronizer) = &self.synchronizer {
            synchronizer.drain().await;
            synchronizer.stop().await;
        }
        self.events.stop(true).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;
    use crate::gal::InMemoryStore;
    use chrono::Utc;

    fn fabric_over(
        primary: Arc<dyn GraphStore>,
        shared: Option<Arc<dyn GraphStore>>,
    ) -> KnowledgeFabric {
        let schema = Arc::new(SchemaRegistry::with_core_schema());
        let clock: Arc<dyn Clock> = Arc::new(TestClock::at(Utc::now()));
        let events = EventProcessor::start(
            crate::config::EventsConfig {
                queue_capacity: 16,
                worker_count: 1,
                backpressure_wait_ms: 100,
            },
            primary.clone(),
            clock.clone(),
        );
        let memory = AssociativeMemory::new(
            primary.clone(),
            clock.clone(),
            Arc::new(NoopEmbeddingProvider),
            crate::config::MemoryConfig::default(),
        );
        KnowledgeFabric {
            schema: schema.clone(),
            clock: clock.clone(),
            primary_store: primary.clone(),
            shared_store: shared,
            events,
            memory,
            dkm: None,
            synchronizer: None,
            domains: Repository::new(primary.clone(), schema.clone(), clock.clone()),
            projects: Repository::new(primary.clone(), schema.clone(), clock.clone()),
            components: Repository::new(primary.clone(), schema.clone(), clock.clone()),
            requirements: Repository::new(primary.clone(), schema.clone(), clock.clone()),
            implementations: Repository::new(primary.clone(), schema.clone(), clock.clone()),
            patterns: Repository::new(primary.clone(), schema.clone(), clock.clone()),
            decisions: Repository::new(primary.clone(), schema.clone(), clock.clone()),
            agents: Repository::new(primary.clone(), schema.clone(), clock.clone()),
            relationships: RelationshipRepo::new(primary, schema),
        }
    }

    #[tokio::test]
    async fn create_domain_then_find_by_id_roundtrips() {
        let fabric = fabric_over(Arc::new(InMemoryStore::new()), None);
        let deadline = Deadline::none();
        let now = Utc::now();
        let domain = crate::model::Domain {
            id: crate::entity::EntityId::new(),
            name: "platform".to_string(),
            description: "core platform domain".to_string(),
            created_at: now,
            updated_at: now,
        };
        let created = fabric.domains().create(&deadline, domain).await.unwrap();
        let found = fabric
            .domains()
            .find_by_id(&deadline, created.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "platform");
        fabric.stop().await;
    }

    #[tokio::test]
    async fn subscribe_receives_logged_events() {
        let fabric = fabric_over(Arc::new(InMemoryStore::new()), None);
        let deadline = Deadline::none();
        let mut stream = fabric.subscribe("agent.*").await;

        fabric
            .log_event(&deadline, Event::new("agent.action", "agent-1", Utc::now()))
            .await
            .unwrap();

        use tokio_stream::StreamExt;
        let received = tokio::time::timeout(Duration::from_millis(500), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.event_type, "agent.action");
        fabric.stop().await;
    }
}

// Copyright 2025 Cowboy AI, LLC.

//! [`DualKnowledgeManager`]: `CreateManagedKG`, `RegisterRule`,
//! `RegisterMapping`, `RegisterPolicy`, `Synchronize` (§4.6).
//!
//! Grounded on a registry-plus-persisted-audit-trail shape: the rule,
//! mapping, and policy structs carry Rust closures (predicates, transforms)
//! that cannot round-trip through the graph, so the canonical copy lives
//! in-memory while a corresponding node (with `APPLIES_TO`/`MAPS_BETWEEN`/
//! `GOVERNS` edges to the Managed KGs it affects) is written to the
//! registry store purely for traceability, mirroring how the teacher keeps
//! a causal/ordering structure (`vector_clock.rs`) alongside the aggregates
//! it orders rather than folding one into the other.

use super::types::{
    Cadence, KgKind, KnowledgePolicy, ManagedKg, PolicyKind, SchemaMapping, SyncDirection,
    SyncOutcome, SynchronizationRule,
};
use crate::clock::Clock;
use crate::context::Deadline;
use crate::entity::{EntityId, ManagedKgMarker};
use crate::errors::{DomainError, DomainResult};
use crate::events::{Event, NodeReference, ProcessorHandle};
use crate::gal::{GraphStore, NodeRecord};
use crate::model::PropertyMap;
use crate::schema::relationship_types::{APPLIES_TO, GOVERNS, MAPS_BETWEEN};
use crate::schema::SchemaRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{instrument, warn};

type Transform = Arc<dyn Fn(&mut PropertyMap) + Send + Sync>;

struct KgEntry {
    kg: ManagedKg,
    node_id: String,
    store: Arc<dyn GraphStore>,
}

/// Governs the coexistence of per-agent local graphs and the shared global
/// graph.
pub struct DualKnowledgeManager {
    registry_store: Arc<dyn GraphStore>,
    schema: Arc<SchemaRegistry>,
    clock: Arc<dyn Clock>,
    events: Option<ProcessorHandle>,
    kgs: RwLock<HashMap<String, KgEntry>>,
    rules: RwLock<HashMap<String, SynchronizationRule>>,
    mappings: RwLock<HashMap<String, SchemaMapping>>,
    policies: RwLock<Vec<KnowledgePolicy>>,
    transforms: RwLock<HashMap<String, Transform>>,
}

impl DualKnowledgeManager {
    /// Build a DKM. `registry_store` holds the meta-graph (`ManagedKG`,
    /// `SynchronizationRule`, `SchemaMapping`, `Policy` nodes and their
    /// edges) — typically the shared/global store. `events`, if present,
    /// receives `knowledge.synchronized` events.
    pub fn new(
        registry_store: Arc<dyn GraphStore>,
        schema: Arc<SchemaRegistry>,
        clock: Arc<dyn Clock>,
        events: Option<ProcessorHandle>,
    ) -> Self {
        Self {
            registry_store,
            schema,
            clock,
            events,
            kgs: RwLock::new(HashMap::new()),
            rules: RwLock::new(HashMap::new()),
            mappings: RwLock::new(HashMap::new()),
            policies: RwLock::new(Vec::new()),
            transforms: RwLock::new(HashMap::new()),
        }
    }

    /// Register a named transform a [`SchemaMapping`] can reference.
    pub async fn register_transform(&self, name: impl Into<String>, transform: Transform) {
        self.transforms.write().await.insert(name.into(), transform);
    }

    /// `CreateManagedKG(name, kind, description) -> kg`, idempotent under
    /// `name`. `store` is the concrete backend this KG reads and writes
    /// through — the DKM doesn't construct backends itself, only binds
    /// names to handles it's given.
    #[instrument(skip(self, store))]
    pub async fn create_managed_kg(
        &self,
        deadline: &Deadline,
        name: &str,
        kind: KgKind,
        description: &str,
        store: Arc<dyn GraphStore>,
    ) -> DomainResult<ManagedKg> {
        if let Some(entry) = self.kgs.read().await.get(name) {
            return Ok(entry.kg.clone());
        }

        let now = self.clock.now();
        let mut props = PropertyMap::new();
        props.insert("name".to_string(), serde_json::json!(name));
        props.insert("kind".to_string(), serde_json::json!(kind_name(kind)));
        props.insert("description".to_string(), serde_json::json!(description));
        let node_id = self
            .registry_store
            .create_node(deadline, "ManagedKG", props)
            .await?;

        let kg = ManagedKg {
            id: EntityId::from_uuid(parse_uuid(&node_id)?),
            name: name.to_string(),
            kind,
            description: description.to_string(),
            created_at: now,
            updated_at: now,
        };

        self.kgs.write().await.insert(
            name.to_string(),
            KgEntry {
                kg: kg.clone(),
                node_id,
                store,
            },
        );
        Ok(kg)
    }

    /// `RegisterRule`: declares a [`SynchronizationRule`] and links it to
    /// the Managed KGs it applies to.
    pub async fn register_rule(
        &self,
        deadline: &Deadline,
        rule: SynchronizationRule,
        applies_to: &[&str],
    ) -> DomainResult<()> {
        let mut props = PropertyMap::new();
        props.insert("name".to_string(), serde_json::json!(rule.name));
        props.insert(
            "direction".to_string(),
            serde_json::json!(format!("{:?}", rule.direction)),
        );
        props.insert("priority".to_string(), serde_json::json!(rule.priority));
        let rule_node_id = self
            .registry_store
            .create_node(deadline, "SynchronizationRule", props)
            .await?;

        for kg_name in applies_to {
            let kg_node_id = self.node_id_for(kg_name).await?;
            self.registry_store
                .create_relationship(
                    deadline,
                    APPLIES_TO,
                    &rule_node_id,
                    &kg_node_id,
                    PropertyMap::new(),
                )
                .await?;
        }

        self.rules.write().await.insert(rule.name.clone(), rule);
        Ok(())
    }

    /// `RegisterMapping`: declares a [`SchemaMapping`] and links it to the
    /// Managed KGs it maps between.
    pub async fn register_mapping(
        &self,
        deadline: &Deadline,
        mapping: SchemaMapping,
        applies_to: &[&str],
    ) -> DomainResult<()> {
        let mut props = PropertyMap::new();
        props.insert("name".to_string(), serde_json::json!(mapping.name));
        props.insert(
            "source_label".to_string(),
            serde_json::json!(mapping.source_label),
        );
        props.insert(
            "target_label".to_string(),
            serde_json::json!(mapping.target_label),
        );
        let mapping_node_id = self
            .registry_store
            .create_node(deadline, "SchemaMapping", props)
            .await?;

        for kg_name in applies_to {
            let kg_node_id = self.node_id_for(kg_name).await?;
            self.registry_store
                .create_relationship(
                    deadline,
                    MAPS_BETWEEN,
                    &mapping_node_id,
                    &kg_node_id,
                    PropertyMap::new(),
                )
                .await?;
        }

        self.mappings
            .write()
            .await
            .insert(mapping.name.clone(), mapping);
        Ok(())
    }

    /// `RegisterPolicy`: declares a [`KnowledgePolicy`] and links it to the
    /// Managed KGs it governs.
    pub async fn register_policy(
        &self,
        deadline: &Deadline,
        policy: KnowledgePolicy,
        applies_to: &[&str],
    ) -> DomainResult<()> {
        let mut props = PropertyMap::new();
        props.insert("name".to_string(), serde_json::json!(policy.name));
        props.insert(
            "kind".to_string(),
            serde_json::json!(format!("{:?}", policy.kind)),
        );
        let policy_node_id = self
            .registry_store
            .create_node(deadline, "Policy", props)
            .await?;

        for kg_name in applies_to {
            let kg_node_id = self.node_id_for(kg_name).await?;
            self.registry_store
                .create_relationship(
                    deadline,
                    GOVERNS,
                    &policy_node_id,
                    &kg_node_id,
                    PropertyMap::new(),
                )
                .await?;
        }

        self.policies.write().await.push(policy);
        Ok(())
    }

    /// `Synchronize(source, target, rule, items?)`: runs the named rule
    /// from `source_kg` into `target_kg` (§4.6's five-step algorithm).
    ///
    /// A [`SyncDirection::Bidirectional`] rule ignores the `source_kg`/
    /// `target_kg` ordering the caller happened to pass and instead runs
    /// two unidirectional passes in a fixed order, local-to-global then
    /// global-to-local, so repeated runs converge regardless of which
    /// name was passed first.
    #[instrument(skip(self, items))]
    pub async fn synchronize(
        &self,
        deadline: &Deadline,
        source_kg: &str,
        target_kg: &str,
        rule_name: &str,
        items: Option<Vec<NodeReference>>,
    ) -> DomainResult<SyncOutcome> {
        let rule = self
            .rules
            .read()
            .await
            .get(rule_name)
            .cloned()
            .ok_or_else(|| DomainError::NotFound(format!("synchronization rule {rule_name}")))?;

        match rule.direction {
            SyncDirection::LocalToGlobal | SyncDirection::GlobalToLocal => {
                self.synchronize_one_pass(deadline, source_kg, target_kg, rule_name, &rule, items)
                    .await
            }
            SyncDirection::Bidirectional => {
                let (local_kg, global_kg) = self.order_local_then_global(source_kg, target_kg).await?;
                let mut outcome = self
                    .synchronize_one_pass(deadline, &local_kg, &global_kg, rule_name, &rule, items.clone())
                    .await?;
                let reverse = self
                    .synchronize_one_pass(deadline, &global_kg, &local_kg, rule_name, &rule, items)
                    .await?;
                outcome.merge(reverse);

                if let Some(events) = &self.events {
                    let event = Event::new("knowledge.synchronized", "dkm", self.clock.now())
                        .with_metadata("rule", serde_json::json!(rule_name))
                        .with_metadata("direction", serde_json::json!("bidirectional"))
                        .with_metadata("items_applied", serde_json::json!(outcome.items_applied));
                    if let Err(e) = events.log(deadline, event).await {
                        warn!(error = %e, "failed to log knowledge.synchronized event");
                    }
                }

                Ok(outcome)
            }
        }
    }

    /// Order `(a, b)` as `(local, global)` by looking up each name's
    /// registered [`KgKind`]. Falls back to `(a, b)` unchanged if neither
    /// or both are `Local`, so a rule applied between two local (or two
    /// global) KGs still runs in the order the caller supplied.
    async fn order_local_then_global(&self, a: &str, b: &str) -> DomainResult<(String, String)> {
        let kgs = self.kgs.read().await;
        let kind_of = |name: &str| kgs.get(name).map(|entry| entry.kg.kind);
        match (kind_of(a), kind_of(b)) {
            (Some(KgKind::Global), Some(KgKind::Local)) => Ok((b.to_string(), a.to_string())),
            _ => Ok((a.to_string(), b.to_string())),
        }
    }

    /// One unidirectional `source_kg -> target_kg` pass of `rule`'s
    /// five-step algorithm: select candidates, veto-check, map, promote,
    /// carry over relationships.
    async fn synchronize_one_pass(
        &self,
        deadline: &Deadline,
        source_kg: &str,
        target_kg: &str,
        rule_name: &str,
        rule: &SynchronizationRule,
        items: Option<Vec<NodeReference>>,
    ) -> DomainResult<SyncOutcome> {
        let source_store = self.store_for(source_kg).await?;
        let target_store = self.store_for(target_kg).await?;

        let candidates = self
            .select_candidates(deadline, &source_store, rule, items)
            .await?;

        let mut outcome = SyncOutcome::default();
        for node in candidates {
            outcome.items_considered += 1;

            if self.is_vetoed(&node).await {
                outcome.items_vetoed += 1;
                continue;
            }

            let mapping = match self.mapping_for(&node.label).await {
                Some(mapping) => mapping,
                None => {
                    outcome
                        .errors
                        .push(format!("no schema mapping registered for {}", node.label));
                    continue;
                }
            };

            match self
                .promote_node(deadline, &target_store, &node, &mapping)
                .await
            {
                Ok(changed) => {
                    if changed {
                        outcome.items_applied += 1;
                    }
                }
                Err(e) => {
                    outcome.errors.push(e.to_string());
                    continue;
                }
            }

            self.carry_over_relationships(
                deadline,
                &source_store,
                &target_store,
                &node,
                &mapping,
                &mut outcome,
            )
            .await?;
        }

        if let Some(events) = &self.events {
            let event = Event::new("knowledge.synchronized", "dkm", self.clock.now())
                .with_metadata("rule", serde_json::json!(rule_name))
                .with_metadata("source", serde_json::json!(source_kg))
                .with_metadata("target", serde_json::json!(target_kg))
                .with_metadata("items_applied", serde_json::json!(outcome.items_applied));
            if let Err(e) = events.log(deadline, event).await {
                warn!(error = %e, "failed to log knowledge.synchronized event");
            }
        }

        Ok(outcome)
    }

    async fn select_candidates(
        &self,
        deadline: &Deadline,
        source_store: &Arc<dyn GraphStore>,
        rule: &SynchronizationRule,
        items: Option<Vec<NodeReference>>,
    ) -> DomainResult<Vec<NodeRecord>> {
        match items {
            Some(refs) => {
                let mut out = Vec::with_capacity(refs.len());
                for reference in refs {
                    if let Some(record) = source_store
                        .get_node(deadline, &reference.label, &reference.id)
                        .await?
                    {
                        out.push(record);
                    }
                }
                Ok(out)
            }
            None => {
                let all = source_store.find_all(deadline, &rule.scope_label).await?;
                Ok(all
                    .into_iter()
                    .filter(|record| {
                        rule.predicate
                            .as_ref()
                            .map(|predicate| predicate(record, None))
                            .unwrap_or(true)
                    })
                    .collect())
            }
        }
    }

    async fn is_vetoed(&self, node: &NodeRecord) -> bool {
        let policies = self.policies.read().await;
        policies.iter().any(|policy| {
            policy.kind == PolicyKind::Sharing
                && policy.covers(&node.label)
                && !(policy.predicate)(node, None)
        })
    }

    /// Writes the promoted node to `target_store` unless it is already
    /// present with equivalent content, so that re-running a rule with no
    /// source-side changes applies zero items (§8).
    async fn promote_node(
        &self,
        deadline: &Deadline,
        target_store: &Arc<dyn GraphStore>,
        node: &NodeRecord,
        mapping: &SchemaMapping,
    ) -> DomainResult<bool> {
        let mut mapped = apply_field_map(&mapping.field_map, &node.properties);
        if let Some(name) = &mapping.transform {
            if let Some(transform) = self.transforms.read().await.get(name) {
                transform(&mut mapped);
            }
        }

        let existing = target_store
            .get_node(deadline, &mapping.target_label, &node.id)
            .await?;

        let to_write = match existing {
            Some(existing) if !source_wins(&existing.properties, &mapped) => return Ok(false),
            Some(existing) => {
                let merged = merge_overlay(existing.properties.clone(), mapped, &mapping.immutable_fields);
                if merged == existing.properties {
                    return Ok(false);
                }
                merged
            }
            None => mapped,
        };

        target_store
            .upsert_node(deadline, &mapping.target_label, &node.id, to_write)
            .await?;
        Ok(true)
    }

    async fn carry_over_relationships(
        &self,
        deadline: &Deadline,
        source_store: &Arc<dyn GraphStore>,
        target_store: &Arc<dyn GraphStore>,
        node: &NodeRecord,
        mapping: &SchemaMapping,
        outcome: &mut SyncOutcome,
    ) -> DomainResult<()> {
        for rel_type in self.schema.relationship_types() {
            let rels = source_store
                .find_relationships_from(deadline, rel_type, &node.id)
                .await?;
            for rel in rels {
                let candidate_labels = self.candidate_target_labels(rel_type, &node.label, &mapping.target_label);
                let mut endpoint_exists = false;
                for label in &candidate_labels {
                    if target_store
                        .get_node(deadline, label, &rel.target_id)
                        .await?
                        .is_some()
                    {
                        endpoint_exists = true;
                        break;
                    }
                }

                if !endpoint_exists {
                    outcome.items_deferred += 1;
                    continue;
                }

                let already_present = target_store
                    .find_relationships_from(deadline, rel_type, &node.id)
                    .await?
                    .iter()
                    .any(|existing| existing.target_id == rel.target_id);
                if !already_present {
                    target_store
                        .create_relationship(
                            deadline,
                            rel_type,
                            &node.id,
                            &rel.target_id,
                            rel.properties.clone(),
                        )
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Labels to probe the target store under for a carried-over edge's
    /// target node: the Schema Registry's declared target labels for
    /// `rel_type` when known, falling back to the promoted node's own
    /// labels for relationship types the registry doesn't constrain.
    fn candidate_target_labels(
        &self,
        rel_type: &str,
        node_label: &str,
        mapped_label: &str,
    ) -> Vec<String> {
        match self.schema.relationship(rel_type) {
            Some(schema) if !schema.target_labels.is_empty() => {
                schema.target_labels.iter().cloned().collect()
            }
            _ => vec![node_label.to_string(), mapped_label.to_string()],
        }
    }

    async fn mapping_for(&self, source_label: &str) -> Option<SchemaMapping> {
        self.mappings
            .read()
            .await
            .values()
            .find(|mapping| mapping.source_label == source_label)
            .cloned()
    }

    async fn store_for(&self, kg_name: &str) -> DomainResult<Arc<dyn GraphStore>> {
        self.kgs
            .read()
            .await
            .get(kg_name)
            .map(|entry| entry.store.clone())
            .ok_or_else(|| DomainError::NotFound(format!("managed kg {kg_name}")))
    }

    async fn node_id_for(&self, kg_name: &str) -> DomainResult<String> {
        self.kgs
            .read()
            .await
            .get(kg_name)
            .map(|entry| entry.node_id.clone())
            .ok_or_else(|| DomainError::NotFound(format!("managed kg {kg_name}")))
    }
}

fn kind_name(kind: KgKind) -> &'static str {
    match kind {
        KgKind::Local => "local",
        KgKind::Global => "global",
    }
}

fn parse_uuid(raw: &str) -> DomainResult<uuid::Uuid> {
    uuid::Uuid::parse_str(raw)
        .map_err(|e| DomainError::InternalError(format!("backend returned non-uuid id: {e}")))
}

fn apply_field_map(
    field_map: &HashMap<String, String>,
    props: &PropertyMap,
) -> PropertyMap {
    props
        .iter()
        .map(|(key, value)| {
            let mapped_key = field_map.get(key).cloned().unwrap_or_else(|| key.clone());
            (mapped_key, value.clone())
        })
        .collect()
}

/// True if the candidate record should overwrite the existing target
/// record: its `updated_at` is at least as recent, or either side lacks a
/// usable timestamp (in which case the candidate is assumed to be the
/// promotion actually requested).
fn source_wins(existing: &PropertyMap, candidate: &PropertyMap) -> bool {
    let existing_ts = updated_at_of(existing);
    let candidate_ts = updated_at_of(candidate);
    match (existing_ts, candidate_ts) {
        (Some(existing), Some(candidate)) => candidate >= existing,
        _ => true,
    }
}

fn updated_at_of(props: &PropertyMap) -> Option<chrono::DateTime<chrono::Utc>> {
    props
        .get("updated_at")
        .and_then(|v| v.as_str())
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
}

/// Overlay `candidate` onto `existing`, skipping any field named in
/// `immutable`. Fields present only in `existing` are kept.
fn merge_overlay(
    mut existing: PropertyMap,
    candidate: PropertyMap,
    immutable: &std::collections::HashSet<String>,
) -> PropertyMap {
    for (key, value) in candidate {
        if !immutable.contains(&key) {
            existing.insert(key, value);
        }
    }
    existing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;
    use crate::gal::InMemoryStore;
    use crate::schema::relationship_types::DEPENDS_ON;
    use chrono::Utc;

    fn dkm_over(registry_store: Arc<dyn GraphStore>) -> DualKnowledgeManager {
        DualKnowledgeManager::new(
            registry_store,
            Arc::new(SchemaRegistry::with_core_schema()),
            Arc::new(TestClock::at(Utc::now())),
            None,
        )
    }

    #[tokio::test]
    async fn create_managed_kg_is_idempotent_under_name() {
        let registry: Arc<dyn GraphStore> = Arc::new(InMemoryStore::new());
        let dkm = dkm_over(registry.clone());
        let deadline = Deadline::none();
        let local: Arc<dyn GraphStore> = Arc::new(InMemoryStore::new());

        let first = dkm
            .create_managed_kg(&deadline, "agent-1", KgKind::Local, "agent 1's graph", local.clone())
            .await
            .unwrap();
        let second = dkm
            .create_managed_kg(&deadline, "agent-1", KgKind::Local, "different description", local)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.description, "agent 1's graph");
    }

    #[tokio::test]
    async fn synchronize_promotes_new_node_into_target() {
        let registry: Arc<dyn GraphStore> = Arc::new(InMemoryStore::new());
        let dkm = dkm_over(registry.clone());
        let deadline = Deadline::none();

        let local: Arc<dyn GraphStore> = Arc::new(InMemoryStore::new());
        let global: Arc<dyn GraphStore> = Arc::new(InMemoryStore::new());
        dkm.create_managed_kg(&deadline, "local", KgKind::Local, "", local.clone())
            .await
            .unwrap();
        dkm.create_managed_kg(&deadline, "global", KgKind::Global, "", global.clone())
            .await
            .unwrap();

        dkm.register_mapping(
            &deadline,
            SchemaMapping::identity("component-mapping", "Component"),
            &["local", "global"],
        )
        .await
        .unwrap();

        let rule = SynchronizationRule {
            id: EntityId::new(),
            name: "promote-components".to_string(),
            direction: crate::dkm::SyncDirection::LocalToGlobal,
            scope_label: "Component".to_string(),
            predicate: None,
            cadence: Cadence::Manual,
            priority: 0,
        };
        dkm.register_rule(&deadline, rule, &["local", "global"])
            .await
            .unwrap();

        let mut props = PropertyMap::new();
        props.insert("name".to_string(), serde_json::json!("auth-service"));
        props.insert(
            "updated_at".to_string(),
            serde_json::json!(Utc::now().to_rfc3339()),
        );
        let component_id = local
            .create_node(&deadline, "Component", props)
            .await
            .unwrap();

        let outcome = dkm
            .synchronize(&deadline, "local", "global", "promote-components", None)
            .await
            .unwrap();

        assert_eq!(outcome.items_considered, 1);
        assert_eq!(outcome.items_applied, 1);
        assert!(outcome.is_ok());

        let promoted = global
            .get_node(&deadline, "Component", &component_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(promoted.properties.get("name").unwrap(), "auth-service");

        let rerun = dkm
            .synchronize(&deadline, "local", "global", "promote-components", None)
            .await
            .unwrap();
        assert_eq!(rerun.items_applied, 0);
        assert_eq!(rerun.items_vetoed, 0);
    }

    #[tokio::test]
    async fn synchronize_vetoes_candidates_rejected_by_sharing_policy() {
        let registry: Arc<dyn GraphStore> = Arc::new(InMemoryStore::new());
        let dkm = dkm_over(registry.clone());
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
        dkm.register_policy(
            &deadline,
            KnowledgePolicy {
                id: EntityId::new(),
                name: "no-sharing".to_string(),
                kind: PolicyKind::Sharing,
                scope: vec!["Component".to_string()],
                predicate: Arc::new(|_, _| false),
            },
            &["local", "global"],
        )
        .await
        .unwrap();

        let rule = SynchronizationRule {
            id: EntityId::new(),
            name: "promote-components".to_string(),
            direction: crate::dkm::SyncDirection::LocalToGlobal,
            scope_label: "Component".to_string(),
            predicate: None,
            cadence: Cadence::Manual,
            priority: 0,
        };
        dkm.register_rule(&deadline, rule, &["local", "global"])
            .await
            .unwrap();

        local
            .create_node(&deadline, "Component", PropertyMap::new())
            .await
            .unwrap();

        let outcome = dkm
            .synchronize(&deadline, "local", "global", "promote-components", None)
            .await
            .unwrap();
        assert_eq!(outcome.items_vetoed, 1);
        assert_eq!(outcome.items_applied, 0);
    }

    #[tokio::test]
    async fn synchronize_defers_relationship_with_unpromoted_endpoint() {
        let registry: Arc<dyn GraphStore> = Arc::new(InMemoryStore::new());
        let dkm = dkm_over(registry.clone());
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
        let rule = SynchronizationRule {
            id: EntityId::new(),
            name: "promote-components".to_string(),
            direction: crate::dkm::SyncDirection::LocalToGlobal,
            scope_label: "Component".to_string(),
            predicate: None,
            cadence: Cadence::Manual,
            priority: 0,
        };
        dkm.register_rule(&deadline, rule, &["local", "global"])
            .await
            .unwrap();

        let a = local
            .create_node(&deadline, "Component", PropertyMap::new())
            .await
            .unwrap();
        let b = local
            .create_node(&deadline, "Component", PropertyMap::new())
            .await
            .unwrap();
        local
            .create_relationship(&deadline, DEPENDS_ON, &a, &b, PropertyMap::new())
            .await
            .unwrap();

        let outcome = dkm
            .synchronize(
                &deadline,
                "local",
                "global",
                "promote-components",
                Some(vec![NodeReference {
                    label: "Component".to_string(),
                    id: a,
                }]),
            )
            .await
            .unwrap();

        assert_eq!(outcome.items_applied, 1);
        assert_eq!(outcome.items_deferred, 1);
    }

    #[tokio::test]
    async fn synchronize_carries_over_cross_label_relationship() {
        use crate::schema::relationship_types::MADE_BY;

        let registry: Arc<dyn GraphStore> = Arc::new(InMemoryStore::new());
        let dkm = dkm_over(registry.clone());
        let deadline = Deadline::none();

        let local: Arc<dyn GraphStore> = Arc::new(InMemoryStore::new());
        let global: Arc<dyn GraphStore> = Arc::new(InMemoryStore::new());
        dkm.create_managed_kg(&deadline, "local", KgKind::Local, "", local.clone())
            .await
            .unwrap();
        dkm.create_managed_kg(&deadline, "global", KgKind::Global, "", global.clone())
            .await
            .unwrap();
        dkm.register_mapping(
            &deadline,
            SchemaMapping::identity("decision-mapping", "Decision"),
            &["local", "global"],
        )
        .await
        .unwrap();
        let rule = SynchronizationRule {
            id: EntityId::new(),
            name: "promote-decisions".to_string(),
            direction: crate::dkm::SyncDirection::LocalToGlobal,
            scope_label: "Decision".to_string(),
            predicate: None,
            cadence: Cadence::Manual,
            priority: 0,
        };
        dkm.register_rule(&deadline, rule, &["local", "global"])
            .await
            .unwrap();

        let agent_id = local
            .create_node(&deadline, "Agent", PropertyMap::new())
            .await
            .unwrap();
        global
            .upsert_node(&deadline, "Agent", &agent_id, PropertyMap::new())
            .await
            .unwrap();

        let decision_id = local
            .create_node(&deadline, "Decision", PropertyMap::new())
            .await
            .unwrap();
        local
            .create_relationship(&deadline, MADE_BY, &decision_id, &agent_id, PropertyMap::new())
            .await
            .unwrap();

        dkm.synchronize(&deadline, "local", "global", "promote-decisions", None)
            .await
            .unwrap();

        let carried = global
            .find_relationships_from(&deadline, MADE_BY, &decision_id)
            .await
            .unwrap();
        assert_eq!(carried.len(), 1);
        assert_eq!(carried[0].target_id, agent_id);
    }

    #[tokio::test]
    async fn bidirectional_rule_promotes_both_ways_local_first() {
        let registry: Arc<dyn GraphStore> = Arc::new(InMemoryStore::new());
        let dkm = dkm_over(registry.clone());
        let deadline = Deadline::none();

        let local: Arc<dyn GraphStore> = Arc::new(InMemoryStore::new());
        let global: Arc<dyn GraphStore> = Arc::new(InMemoryStore::new());
        dkm.create_managed_kg(&deadline, "local", KgKind::Local, "", local.clone())
            .await
            .unwrap();
        dkm.create_managed_kg(&deadline, "global", KgKind::Global, "", global.clone())
            .await
            .unwrap();
        dkm.register_mapping(
            &deadline,
            SchemaMapping::identity("component-mapping", "Component"),
            &["local", "global"],
        )
        .await
        .unwrap();

        let rule = SynchronizationRule {
            id: EntityId::new(),
            name: "mirror-components".to_string(),
            direction: SyncDirection::Bidirectional,
            scope_label: "Component".to_string(),
            predicate: None,
            cadence: Cadence::Manual,
            priority: 0,
        };
        dkm.register_rule(&deadline, rule, &["local", "global"])
            .await
            .unwrap();

        let local_only = local
            .create_node(&deadline, "Component", PropertyMap::new())
            .await
            .unwrap();
        let global_only = global
            .create_node(&deadline, "Component", PropertyMap::new())
            .await
            .unwrap();

        // Caller passes (global, local) — the rule must still run
        // local-to-global first regardless of argument order.
        let outcome = dkm
            .synchronize(&deadline, "global", "local", "mirror-components", None)
            .await
            .unwrap();
        assert_eq!(outcome.items_applied, 2);

        assert!(global
            .get_node(&deadline, "Component", &local_only)
            .await
            .unwrap()
            .is_some());
        assert!(local
            .get_node(&deadline, "Component", &global_only)
            .await
            .unwrap()
            .is_some());

        let rerun = dkm
            .synchronize(&deadline, "local", "global", "mirror-components", None)
            .await
            .unwrap();
        assert_eq!(rerun.items_applied, 0);
    }
}

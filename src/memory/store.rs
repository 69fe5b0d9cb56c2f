// Copyright 2025 Cowboy AI, LLC.

//! [`AssociativeMemory`]: `Store`/`RecallByID`/`RecallByContext`/
//! `RecallByType`/`Associate`/`Decay` (§4.5).

use super::record::{Memory, MemoryType};
use super::scoring::{context_match, recall_score};
use crate::clock::Clock;
use crate::config::MemoryConfig;
use crate::context::Deadline;
use crate::embedding::{cosine_similarity_rescaled, EmbeddingProvider};
use crate::entity::{EntityId, MemoryMarker};
use crate::errors::{DomainError, DomainResult};
use crate::gal::GraphStore;
use crate::model::PropertyMap;
use crate::schema::relationship_types::RELATED_TO;
use std::collections::HashMap;
use std::sync::Arc;

/// The associative memory subsystem.
pub struct AssociativeMemory {
    store: Arc<dyn GraphStore>,
    clock: Arc<dyn Clock>,
    embedding: Arc<dyn EmbeddingProvider>,
    config: MemoryConfig,
}

impl AssociativeMemory {
    /// Build the subsystem over a shared store, clock, and embedding
    /// provider, scored per `config`.
    pub fn new(
        store: Arc<dyn GraphStore>,
        clock: Arc<dyn Clock>,
        embedding: Arc<dyn EmbeddingProvider>,
        config: MemoryConfig,
    ) -> Self {
        Self {
            store,
            clock,
            embedding,
            config,
        }
    }

    /// `Store(content, context, type, importance?)`.
    pub async fn store(
        &self,
        deadline: &Deadline,
        content: impl Into<String>,
        context: HashMap<String, String>,
        memory_type: MemoryType,
        importance: f32,
    ) -> DomainResult<EntityId<MemoryMarker>> {
        let now = self.clock.now();
        let mut memory = Memory::new(content, context, memory_type, importance, now);

        if self.embedding.dimensions() > 0 {
            let projection = canonical_projection(&memory.content, &memory.context);
            memory.embedding = Some(self.embedding.embed(&projection).await?);
        }

        let props = memory_to_properties(&memory);
        let id = self.store.create_node(deadline, "Memory", props).await?;
        let id = EntityId::from_uuid(
            uuid::Uuid::parse_str(&id)
                .map_err(|e| DomainError::InternalError(format!("bad memory id: {e}")))?,
        );
        Ok(id)
    }

    /// `RecallByID(id)`: bumps `last_accessed`/`access_count` on read.
    pub async fn recall_by_id(
        &self,
        deadline: &Deadline,
        id: EntityId<MemoryMarker>,
    ) -> DomainResult<Option<Memory>> {
        let id_str = id.as_uuid().to_string();
        let record = match self.store.get_node(deadline, "Memory", &id_str).await? {
            Some(record) => record,
            None => return Ok(None),
        };
        let mut memory = properties_to_memory(id, &record.properties)?;

        memory.last_accessed = self.clock.now();
        memory.access_count += 1;

        let mut update = PropertyMap::new();
        update.insert(
            "last_accessed".to_string(),
            serde_json::json!(memory.last_accessed.to_rfc3339()),
        );
        update.insert(
            "access_count".to_string(),
            serde_json::json!(memory.access_count),
        );
        self.store
            .update_node(deadline, "Memory", &id_str, update)
            .await?;

        Ok(Some(memory))
    }

    /// `RecallByContext(contextQuery, limit)`, ordered by decreasing score.
    /// Memories that share none of the queried context keys are excluded
    /// outright rather than merely ranked last.
    pub async fn recall_by_context(
        &self,
        deadline: &Deadline,
        query: &HashMap<String, String>,
        limit: usize,
    ) -> DomainResult<Vec<Memory>> {
        let records = self.store.find_all(deadline, "Memory").await?;
        let now = self.clock.now();

        let query_embedding = if self.embedding.dimensions() > 0 {
            let projection = canonical_projection("", query);
            Some(self.embedding.embed(&projection).await?)
        } else {
            None
        };

        let mut scored = Vec::with_capacity(records.len());
        for record in records {
            let id = parse_memory_id(&record.id)?;
            let memory = properties_to_memory(id, &record.properties)?;

            let cm = context_match(query, &memory.context);
            if !query.is_empty() && cm == 0.0 {
                continue;
            }
            let importance_now = memory.importance_now(now, self.config.decay_lambda);
            let semantic_sim = match (&query_embedding, &memory.embedding) {
                (Some(q), Some(e)) => cosine_similarity_rescaled(q, e),
                _ => 0.0,
            };
            let score = recall_score(
                cm,
                importance_now,
                semantic_sim,
                self.config.alpha,
                self.config.beta,
                self.config.gamma,
            );
            scored.push((score, memory));
        }

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(scored.into_iter().take(limit).map(|(_, m)| m).collect())
    }

    /// `RecallByType(type, limit)`, most-recent-first.
    pub async fn recall_by_type(
        &self,
        deadline: &Deadline,
        memory_type: MemoryType,
        limit: usize,
    ) -> DomainResult<Vec<Memory>> {
        let records = self
            .store
            .find_by_property(
                deadline,
                "Memory",
                "memory_type",
                &serde_json::json!(memory_type_name(memory_type)),
            )
            .await?;
        let mut memories = Vec::with_capacity(records.len());
        for record in records {
            let id = parse_memory_id(&record.id)?;
            memories.push(properties_to_memory(id, &record.properties)?);
        }
        memories.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        memories.truncate(limit);
        Ok(memories)
    }

    /// `Associate(a, b, relation, strength)`: idempotent under `(a, b,
    /// relation)` — repeated calls raise strength to the max of old and
    /// new, never lower it.
    pub async fn associate(
        &self,
        deadline: &Deadline,
        a: EntityId<MemoryMarker>,
        b: EntityId<MemoryMarker>,
        relation: &str,
        strength: f32,
    ) -> DomainResult<()> {
        let strength = strength.clamp(0.0, 1.0);
        let a_id = a.as_uuid().to_string();
        let b_id = b.as_uuid().to_string();

        let existing = self
            .store
            .find_relationships_from(deadline, RELATED_TO, &a_id)
            .await?;
        let matching = existing.into_iter().find(|r| {
            r.target_id == b_id
                && r.properties.get("relation").and_then(|v| v.as_str()) == Some(relation)
        });

        let merged_strength = match &matching {
            Some(r) => {
                let old = r
                    .properties
                    .get("strength")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.0) as f32;
                old.max(strength)
            }
            None => strength,
        };

        if let Some(existing) = matching {
            self.store.delete_relationship(deadline, &existing.id).await?;
        }

        let mut props = PropertyMap::new();
        props.insert("relation".to_string(), serde_json::json!(relation));
        props.insert("strength".to_string(), serde_json::json!(merged_strength));
        self.store
            .create_relationship(deadline, RELATED_TO, &a_id, &b_id, props)
            .await?;
        Ok(())
    }

    /// `Decay(now)`: the decayed `importance_now` for one memory, computed
    /// lazily — never persisted.
    pub fn decay(&self, memory: &Memory, now: chrono::DateTime<chrono::Utc>) -> f32 {
        memory.importance_now(now, self.config.decay_lambda)
    }
}

fn canonical_projection(content: &str, context: &HashMap<String, String>) -> String {
    let mut pairs: Vec<_> = context.iter().collect();
    pairs.sort_by_key(|(k, _)| k.clone());
    let context_str = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",");
    format!("{content}|{context_str}")
}

fn memory_type_name(memory_type: MemoryType) -> &'static str {
    match memory_type {
        MemoryType::Episodic => "episodic",
        MemoryType::Semantic => "semantic",
        MemoryType::Working => "working",
        MemoryType::Procedural => "procedural",
    }
}

fn parse_memory_id(raw: &str) -> DomainResult<EntityId<MemoryMarker>> {
    uuid::Uuid::parse_str(raw)
        .map(EntityId::from_uuid)
        .map_err(|e| DomainError::InternalError(format!("backend returned non-uuid id: {e}")))
}

fn memory_to_properties(memory: &Memory) -> PropertyMap {
    let mut props = PropertyMap::new();
    props.insert("content".to_string(), serde_json::json!(memory.content));
    props.insert("context".to_string(), serde_json::json!(memory.context));
    props.insert(
        "memory_type".to_string(),
        serde_json::json!(memory_type_name(memory.memory_type)),
    );
    props.insert(
        "timestamp".to_string(),
        serde_json::json!(memory.timestamp.to_rfc3339()),
    );
    props.insert("importance".to_string(), serde_json::json!(memory.importance));
    props.insert(
        "last_accessed".to_string(),
        serde_json::json!(memory.last_accessed.to_rfc3339()),
    );
    props.insert(
        "access_count".to_string(),
        serde_json::json!(memory.access_count),
    );
    if let Some(embedding) = &memory.embedding {
        props.insert("embedding".to_string(), serde_json::json!(embedding));
    }
    props
}

fn properties_to_memory(
    id: EntityId<MemoryMarker>,
    props: &PropertyMap,
) -> DomainResult<Memory> {
    let content = props
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let context: HashMap<String, String> = props
        .get("context")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    let memory_type = match props.get("memory_type").and_then(|v| v.as_str()) {
        Some("semantic") => MemoryType::Semantic,
        Some("working") => MemoryType::Working,
        Some("procedural") => MemoryType::Procedural,
        _ => MemoryType::Episodic,
    };
    let now = chrono::Utc::now();
    let timestamp = props
        .get("timestamp")
        .and_then(|v| v.as_str())
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or(now);
    let importance = props
        .get("importance")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0) as f32;
    let last_accessed = props
        .get("last_accessed")
        .and_then(|v| v.as_str())
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or(timestamp);
    let access_count = props
        .get("access_count")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    let embedding = props
        .get("embedding")
        .and_then(|v| serde_json::from_value(v.clone()).ok());

    Ok(Memory {
        id,
        content,
        context,
        memory_type,
        timestamp,
        importance,
        last_accessed,
        access_count,
        embedding,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;
    use crate::embedding::NoopEmbeddingProvider;
    use crate::gal::InMemoryStore;

    fn memory_subsystem() -> AssociativeMemory {
        AssociativeMemory::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(TestClock::at(chrono::Utc::now())),
            Arc::new(NoopEmbeddingProvider),
            MemoryConfig::default(),
        )
    }

    #[tokio::test]
    async fn store_then_recall_by_id_bumps_access_count() {
        let memory = memory_subsystem();
        let deadline = Deadline::none();
        let id = memory
            .store(&deadline, "hello", HashMap::new(), MemoryType::Episodic, 0.5)
            .await
            .unwrap();

        let recalled = memory.recall_by_id(&deadline, id).await.unwrap().unwrap();
        assert_eq!(recalled.access_count, 1);

        let recalled_again = memory.recall_by_id(&deadline, id).await.unwrap().unwrap();
        assert_eq!(recalled_again.access_count, 2);
    }

    #[tokio::test]
    async fn recall_by_context_orders_by_score() {
        let memory = memory_subsystem();
        let deadline = Deadline::none();
        let mut ctx_match = HashMap::new();
        ctx_match.insert("topic".to_string(), "rust".to_string());
        memory
            .store(&deadline, "a", ctx_match, MemoryType::Semantic, 0.9)
            .await
            .unwrap();
        memory
            .store(&deadline, "b", HashMap::new(), MemoryType::Semantic, 0.1)
            .await
            .unwrap();

        let mut query = HashMap::new();
        query.insert("topic".to_string(), "rust".to_string());
        let results = memory.recall_by_context(&deadline, &query, 10).await.unwrap();
        assert_eq!(results[0].content, "a");
    }

    #[tokio::test]
    async fn recall_by_type_is_most_recent_first() {
        let memory = memory_subsystem();
        let deadline = Deadline::none();
        memory
            .store(&deadline, "first", HashMap::new(), MemoryType::Working, 0.5)
            .await
            .unwrap();
        memory
            .store(&deadline, "second", HashMap::new(), MemoryType::Working, 0.5)
            .await
            .unwrap();

        let results = memory
            .recall_by_type(&deadline, MemoryType::Working, 10)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn associate_is_idempotent_and_keeps_max_strength() {
        let memory = memory_subsystem();
        let deadline = Deadline::none();
        let a = memory
            .store(&deadline, "a", HashMap::new(), MemoryType::Episodic, 0.5)
            .await
            .unwrap();
        let b = memory
            .store(&deadline, "b", HashMap::new(), MemoryType::Episodic, 0.5)
            .await
            .unwrap();

        memory.associate(&deadline, a, b, "related", 0.3).await.unwrap();
        memory.associate(&deadline, a, b, "related", 0.7).await.unwrap();
        memory.associate(&deadline, a, b, "related", 0.1).await.unwrap();

        let edges = memory
            .store
            .find_relationships_from(&deadline, RELATED_TO, &a.as_uuid().to_string())
            .await
            .unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(
            edges[0].properties.get("strength").unwrap().as_f64().unwrap(),
            0.7
        );
    }
}

// Copyright 2025 Cowboy AI, LLC.

//! `RelationshipRepo` (§4.3): the one repository with no single owning
//! label, grounded on `relationship_types.rs`'s source/target validation
//! generalized into a runtime check against the Schema Registry instead of
//! a closed Rust enum (the teacher enumerates its relationship types at
//! compile time; this crate's domain extensions add new ones at runtime,
//! so the check has to move to [`crate::schema::SchemaRegistry`]).

use crate::context::Deadline;
use crate::errors::{DomainError, DomainResult};
use crate::gal::{GraphStore, RelationshipRecord};
use crate::model::PropertyMap;
use crate::schema::relationship_types::DEPENDS_ON;
use crate::schema::SchemaRegistry;
use std::collections::HashSet;
use std::sync::Arc;

/// The generic edge repository.
pub struct RelationshipRepo {
    store: Arc<dyn GraphStore>,
    schema: Arc<SchemaRegistry>,
}

impl RelationshipRepo {
    /// Build a relationship repository over a shared store and schema
    /// registry.
    pub fn new(store: Arc<dyn GraphStore>, schema: Arc<SchemaRegistry>) -> Self {
        Self { store, schema }
    }

    /// Create an edge `(source_label, source_id) -[rel_type]-> (target_label,
    /// target_id)`. Verifies both endpoints exist and that the Schema
    /// Registry permits this label pairing for `rel_type`.
    pub async fn create(
        &self,
        deadline: &Deadline,
        source_label: &str,
        source_id: &str,
        target_label: &str,
        target_id: &str,
        rel_type: &str,
        properties: PropertyMap,
    ) -> DomainResult<String> {
        if let Some(schema) = self.schema.relationship(rel_type) {
            if !schema.allows(source_label, target_label) {
                return Err(DomainError::ValidationError(format!(
                    "{rel_type} does not permit {source_label} -> {target_label}"
                )));
            }
        }

        if self
            .store
            .get_node(deadline, source_label, source_id)
            .await?
            .is_none()
        {
            return Err(DomainError::EntityNotFound {
                label: source_label.to_string(),
                id: source_id.to_string(),
            });
        }
        if self
            .store
            .get_node(deadline, target_label, target_id)
            .await?
            .is_none()
        {
            return Err(DomainError::EntityNotFound {
                label: target_label.to_string(),
                id: target_id.to_string(),
            });
        }

        if rel_type == DEPENDS_ON && !Self::is_weak(&properties) {
            if self
                .would_introduce_cycle(deadline, rel_type, source_id, target_id)
                .await?
            {
                return Err(DomainError::ValidationError(format!(
                    "{rel_type} from {source_id} to {target_id} would introduce a dependency cycle"
                )));
            }
        }

        self.store
            .create_relationship(deadline, rel_type, source_id, target_id, properties)
            .await
    }

    fn is_weak(properties: &PropertyMap) -> bool {
        matches!(properties.get("weak"), Some(serde_json::Value::Bool(true)))
    }

    /// True if an edge `rel_type` from `source_id` to `target_id` would close
    /// a cycle, i.e. `target_id` can already reach `source_id` by following
    /// existing `rel_type` edges.
    async fn would_introduce_cycle(
        &self,
        deadline: &Deadline,
        rel_type: &str,
        source_id: &str,
        target_id: &str,
    ) -> DomainResult<bool> {
        if source_id == target_id {
            return Ok(true);
        }

        let mut visited = HashSet::new();
        visited.insert(target_id.to_string());
        let mut frontier = vec![target_id.to_string()];

        while let Some(node) = frontier.pop() {
            let edges = self
                .store
                .find_relationships_from(deadline, rel_type, &node)
                .await?;
            for edge in edges {
                if edge.target_id == source_id {
                    return Ok(true);
                }
                if visited.insert(edge.target_id.clone()) {
                    frontier.push(edge.target_id);
                }
            }
        }

        Ok(false)
    }

    /// Relationships of `rel_type` originating at `source_id`.
    pub async fn find_from(
        &self,
        deadline: &Deadline,
        rel_type: &str,
        source_id: &str,
    ) -> DomainResult<Vec<RelationshipRecord>> {
        self.store
            .find_relationships_from(deadline, rel_type, source_id)
            .await
    }

    /// Relationships of `rel_type` terminating at `target_id`.
    pub async fn find_to(
        &self,
        deadline: &Deadline,
        rel_type: &str,
        target_id: &str,
    ) -> DomainResult<Vec<RelationshipRecord>> {
        self.store
            .find_relationships_to(deadline, rel_type, target_id)
            .await
    }

    /// Delete an edge by id.
    pub async fn delete(&self, deadline: &Deadline, id: &str) -> DomainResult<()> {
        self.store.delete_relationship(deadline, id).await
    }
}

// Copyright 2025 Cowboy AI, LLC.

//! [`GraphStore`]: structured node/relationship CRUD, the seam
//! [`crate::repositories`] programs against. Grounded on the trait-first
//! split between a storage contract and its concrete backends shown in the
//! `neo4j-rs` reference example (`StorageBackend`): callers never see
//! Cypher text, only labels, ids, and property maps.

use super::backend::GraphBackend;
use super::pool::ConnectionPool;
use super::record::{NodeRecord, RelationshipRecord};
use crate::context::Deadline;
use crate::errors::{DomainError, DomainResult};
use crate::model::PropertyMap;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Structured CRUD against the property graph, independent of dialect.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create a node with the given label and properties, returning its
    /// generated id.
    async fn create_node(
        &self,
        deadline: &Deadline,
        label: &str,
        properties: PropertyMap,
    ) -> DomainResult<String>;

    /// Fetch a node by id, if it exists.
    async fn get_node(
        &self,
        deadline: &Deadline,
        label: &str,
        id: &str,
    ) -> DomainResult<Option<NodeRecord>>;

    /// Find nodes of a label whose property equals the given value.
    async fn find_by_property(
        &self,
        deadline: &Deadline,
        label: &str,
        property: &str,
        value: &serde_json::Value,
    ) -> DomainResult<Vec<NodeRecord>>;

    /// All nodes of a label.
    async fn find_all(&self, deadline: &Deadline, label: &str) -> DomainResult<Vec<NodeRecord>>;

    /// Count of nodes of a label.
    async fn count(&self, deadline: &Deadline, label: &str) -> DomainResult<u64>;

    /// Merge `properties` into an existing node, bumping nothing implicitly
    /// (callers own `updated_at`).
    async fn update_node(
        &self,
        deadline: &Deadline,
        label: &str,
        id: &str,
        properties: PropertyMap,
    ) -> DomainResult<()>;

    /// Delete a node and any relationships touching it.
    async fn delete_node(&self, deadline: &Deadline, label: &str, id: &str) -> DomainResult<()>;

    /// Create a relationship between two existing nodes.
    async fn create_relationship(
        &self,
        deadline: &Deadline,
        rel_type: &str,
        source_id: &str,
        target_id: &str,
        properties: PropertyMap,
    ) -> DomainResult<String>;

    /// Relationships of `rel_type` originating at `source_id`.
    async fn find_relationships_from(
        &self,
        deadline: &Deadline,
        rel_type: &str,
        source_id: &str,
    ) -> DomainResult<Vec<RelationshipRecord>>;

    /// Relationships of `rel_type` terminating at `target_id`.
    async fn find_relationships_to(
        &self,
        deadline: &Deadline,
        rel_type: &str,
        target_id: &str,
    ) -> DomainResult<Vec<RelationshipRecord>>;

    /// Delete a relationship by id.
    async fn delete_relationship(&self, deadline: &Deadline, id: &str) -> DomainResult<()>;

    /// Idempotently write a node at a known id: create it if absent, else
    /// replace its properties wholesale. Used by the DKM to promote a node
    /// across graph layers while preserving its id, where `create_node`'s
    /// generated-id contract doesn't fit.
    async fn upsert_node(
        &self,
        deadline: &Deadline,
        label: &str,
        id: &str,
        properties: PropertyMap,
    ) -> DomainResult<()>;
}

/// [`GraphStore`] over a pooled [`GraphBackend`] (production: Neo4j).
pub struct Neo4jStore {
    pool: ConnectionPool,
}

impl Neo4jStore {
    /// Wrap a connection pool as a structured store.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    async fn backend(&self) -> DomainResult<Arc<dyn GraphBackend>> {
        Ok(self.pool.acquire().await?.backend().clone())
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn create_node(
        &self,
        deadline: &Deadline,
        label: &str,
        properties: PropertyMap,
    ) -> DomainResult<String> {
        let id = Uuid::new_v4().to_string();
        let statement = format!("CREATE (n:{label} {{id: $id}}) SET n += $props");
        let mut params = HashMap::new();
        params.insert("id".to_string(), serde_json::json!(id));
        params.insert("props".to_string(), serde_json::json!(properties));
        self.backend()
            .await?
            .query(deadline, &statement, params, &[])
            .await?;
        Ok(id)
    }

    async fn get_node(
        &self,
        deadline: &Deadline,
        label: &str,
        id: &str,
    ) -> DomainResult<Option<NodeRecord>> {
        let statement = format!("MATCH (n:{label} {{id: $id}}) RETURN n.id AS id, properties(n) AS props");
        let mut params = HashMap::new();
        params.insert("id".to_string(), serde_json::json!(id));
        let rows = self
            .backend()
            .await?
            .query(deadline, &statement, params, &["id", "props"])
            .await?;
        rows.into_iter()
            .next()
            .map(|row| node_record_from_row(label, &row))
            .transpose()
    }

    async fn find_by_property(
        &self,
        deadline: &Deadline,
        label: &str,
        property: &str,
        value: &serde_json::Value,
    ) -> DomainResult<Vec<NodeRecord>> {
        let statement = format!(
            "MATCH (n:{label}) WHERE n.{property} = $value RETURN n.id AS id, properties(n) AS props"
        );
        let mut params = HashMap::new();
        params.insert("value".to_string(), value.clone());
        let rows = self
            .backend()
            .await?
            .query(deadline, &statement, params, &["id", "props"])
            .await?;
        rows.iter()
            .map(|row| node_record_from_row(label, row))
            .collect()
    }

    async fn find_all(&self, deadline: &Deadline, label: &str) -> DomainResult<Vec<NodeRecord>> {
        let statement = format!("MATCH (n:{label}) RETURN n.id AS id, properties(n) AS props");
        let rows = self
            .backend()
            .await?
            .query(deadline, &statement, HashMap::new(), &["id", "props"])
            .await?;
        rows.iter()
            .map(|row| node_record_from_row(label, row))
            .collect()
    }

    async fn count(&self, deadline: &Deadline, label: &str) -> DomainResult<u64> {
        Ok(self.find_all(deadline, label).await?.len() as u64)
    }

    async fn update_node(
        &self,
        deadline: &Deadline,
        label: &str,
        id: &str,
        properties: PropertyMap,
    ) -> DomainResult<()> {
        let statement = format!("MATCH (n:{label} {{id: $id}}) SET n += $props");
        let mut params = HashMap::new();
        params.insert("id".to_string(), serde_json::json!(id));
        params.insert("props".to_string(), serde_json::json!(properties));
        self.backend()
            .await?
            .query(deadline, &statement, params, &[])
            .await?;
        Ok(())
    }

    async fn delete_node(&self, deadline: &Deadline, label: &str, id: &str) -> DomainResult<()> {
        let statement = format!("MATCH (n:{label} {{id: $id}}) DETACH DELETE n");
        let mut params = HashMap::new();
        params.insert("id".to_string(), serde_json::json!(id));
        self.backend()
            .await?
            .query(deadline, &statement, params, &[])
            .await?;
        Ok(())
    }

    async fn create_relationship(
        &self,
        deadline: &Deadline,
        rel_type: &str,
        source_id: &str,
        target_id: &str,
        properties: PropertyMap,
    ) -> DomainResult<String> {
        let id = Uuid::new_v4().to_string();
        let statement = format!(
            "MATCH (a {{id: $source_id}}), (b {{id: $target_id}}) \
             CREATE (a)-[r:{rel_type} {{id: $id}}]->(b) SET r += $props"
        );
        let mut params = HashMap::new();
        params.insert("id".to_string(), serde_json::json!(id));
        params.insert("source_id".to_string(), serde_json::json!(source_id));
        params.insert("target_id".to_string(), serde_json::json!(target_id));
        params.insert("props".to_string(), serde_json::json!(properties));
        self.backend()
            .await?
            .query(deadline, &statement, params, &[])
            .await?;
        Ok(id)
    }

    async fn find_relationships_from(
        &self,
        deadline: &Deadline,
        rel_type: &str,
        source_id: &str,
    ) -> DomainResult<Vec<RelationshipRecord>> {
        let statement = format!(
            "MATCH (a {{id: $source_id}})-[r:{rel_type}]->(b) \
             RETURN r.id AS id, properties(r) AS props, b.id AS target_id"
        );
        let mut params = HashMap::new();
        params.insert("source_id".to_string(), serde_json::json!(source_id));
        let rows = self
            .backend()
            .await?
            .query(deadline, &statement, params, &["id", "props", "target_id"])
            .await?;
        rows.iter()
            .map(|row| relationship_record_from_row(rel_type, row, Some(source_id), None))
            .collect()
    }

    async fn find_relationships_to(
        &self,
        deadline: &Deadline,
        rel_type: &str,
        target_id: &str,
    ) -> DomainResult<Vec<RelationshipRecord>> {
        let statement = format!(
            "MATCH (a)-[r:{rel_type}]->(b {{id: $target_id}}) \
             RETURN r.id AS id, properties(r) AS props, a.id AS source_id"
        );
        let mut params = HashMap::new();
        params.insert("target_id".to_string(), serde_json::json!(target_id));
        let rows = self
            .backend()
            .await?
            .query(deadline, &statement, params, &["id", "props", "source_id"])
            .await?;
        rows.iter()
            .map(|row| relationship_record_from_row(rel_type, row, None, Some(target_id)))
            .collect()
    }

    async fn delete_relationship(&self, deadline: &Deadline, id: &str) -> DomainResult<()> {
        let statement = "MATCH ()-[r {id: $id}]->() DELETE r".to_string();
        let mut params = HashMap::new();
        params.insert("id".to_string(), serde_json::json!(id));
        self.backend()
            .await?
            .query(deadline, &statement, params, &[])
            .await?;
        Ok(())
    }

    async fn upsert_node(
        &self,
        deadline: &Deadline,
        label: &str,
        id: &str,
        properties: PropertyMap,
    ) -> DomainResult<()> {
        let statement = format!("MERGE (n:{label} {{id: $id}}) SET n = $props, n.id = $id");
        let mut params = HashMap::new();
        params.insert("id".to_string(), serde_json::json!(id));
        params.insert("props".to_string(), serde_json::json!(properties));
        self.backend()
            .await?
            .query(deadline, &statement, params, &[])
            .await?;
        Ok(())
    }
}

/// Build a [`NodeRecord`] from a row produced by a `RETURN n.id AS id,
/// properties(n) AS props` statement.
fn node_record_from_row(label: &str, row: &super::record::Row) -> DomainResult<NodeRecord> {
    Ok(NodeRecord {
        id: row_string(row, "id")?,
        label: label.to_string(),
        properties: row_properties(row, "props")?,
    })
}

/// Build a [`RelationshipRecord`] from a row produced by a `RETURN r.id AS
/// id, properties(r) AS props, <endpoint> AS <column>` statement. The
/// endpoint the caller already searched on (`known_source`/`known_target`)
/// is threaded through directly rather than re-read off the row.
fn relationship_record_from_row(
    rel_type: &str,
    row: &super::record::Row,
    known_source: Option<&str>,
    known_target: Option<&str>,
) -> DomainResult<RelationshipRecord> {
    let source_id = match known_source {
        Some(id) => id.to_string(),
        None => row_string(row, "source_id")?,
    };
    let target_id = match known_target {
        Some(id) => id.to_string(),
        None => row_string(row, "target_id")?,
    };
    Ok(RelationshipRecord {
        id: row_string(row, "id")?,
        rel_type: rel_type.to_string(),
        source_id,
        target_id,
        properties: row_properties(row, "props")?,
    })
}

/// Read a required string column off a query result row.
fn row_string(row: &super::record::Row, column: &str) -> DomainResult<String> {
    row.get(column)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| DomainError::QueryError {
            message: format!("column `{column}` missing or not a string"),
            statement: String::new(),
        })
}

/// Read a required map column off a query result row as a [`PropertyMap`].
fn row_properties(row: &super::record::Row, column: &str) -> DomainResult<PropertyMap> {
    match row.get(column) {
        Some(serde_json::Value::Object(map)) => {
            Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        }
        Some(_) | None => Err(DomainError::QueryError {
            message: format!("column `{column}` missing or not an object"),
            statement: String::new(),
        }),
    }
}

#[derive(Default, Clone)]
struct InMemoryGraph {
    nodes: HashMap<String, NodeRecord>,
    relationships: HashMap<String, RelationshipRecord>,
}

/// A [`GraphStore`] held entirely in memory: no backend, no Cypher. Used by
/// tests and by callers running the fabric without a live Neo4j instance.
#[derive(Default)]
pub struct InMemoryStore {
    graph: RwLock<InMemoryGraph>,
}

impl InMemoryStore {
    /// An empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GraphStore for InMemoryStore {
    async fn create_node(
        &self,
        _deadline: &Deadline,
        label: &str,
        properties: PropertyMap,
    ) -> DomainResult<String> {
        let id = Uuid::new_v4().to_string();
        let mut graph = self.graph.write().await;
        graph.nodes.insert(
            id.clone(),
            NodeRecord {
                id: id.clone(),
                label: label.to_string(),
                properties,
            },
        );
        Ok(id)
    }

    async fn get_node(
        &self,
        _deadline: &Deadline,
        label: &str,
        id: &str,
    ) -> DomainResult<Option<NodeRecord>> {
        let graph = self.graph.read().await;
        Ok(graph
            .nodes
            .get(id)
            .filter(|n| n.label == label)
            .cloned())
    }

    async fn find_by_property(
        &self,
        _deadline: &Deadline,
        label: &str,
        property: &str,
        value: &serde_json::Value,
    ) -> DomainResult<Vec<NodeRecord>> {
        let graph = self.graph.read().await;
        Ok(graph
            .nodes
            .values()
            .filter(|n| n.label == label && n.properties.get(property) == Some(value))
            .cloned()
            .collect())
    }

    async fn find_all(&self, _deadline: &Deadline, label: &str) -> DomainResult<Vec<NodeRecord>> {
        let graph = self.graph.read().await;
        Ok(graph
            .nodes
            .values()
            .filter(|n| n.label == label)
            .cloned()
            .collect())
    }

    async fn count(&self, deadline: &Deadline, label: &str) -> DomainResult<u64> {
        Ok(self.find_all(deadline, label).await?.len() as u64)
    }

    async fn update_node(
        &self,
        _deadline: &Deadline,
        label: &str,
        id: &str,
        properties: PropertyMap,
    ) -> DomainResult<()> {
        let mut graph = self.graph.write().await;
        let node = graph
            .nodes
            .get_mut(id)
            .filter(|n| n.label == label)
            .ok_or_else(|| DomainError::EntityNotFound {
                label: label.to_string(),
                id: id.to_string(),
            })?;
        node.properties.extend(properties);
        Ok(())
    }

    async fn delete_node(&self, _deadline: &Deadline, label: &str, id: &str) -> DomainResult<()> {
        let mut graph = self.graph.write().await;
        let existed = graph
            .nodes
            .get(id)
            .map(|n| n.label == label)
            .unwrap_or(false);
        if !existed {
            return Err(DomainError::EntityNotFound {
                label: label.to_string(),
                id: id.to_string(),
            });
        }
        graph.nodes.remove(id);
        graph
            .relationships
            .retain(|_, r| r.source_id != id && r.target_id != id);
        Ok(())
    }

    async fn create_relationship(
        &self,
        _deadline: &Deadline,
        rel_type: &str,
        source_id: &str,
        target_id: &str,
        properties: PropertyMap,
    ) -> DomainResult<String> {
        let id = Uuid::new_v4().to_string();
        let mut graph = self.graph.write().await;
        if !graph.nodes.contains_key(source_id) || !graph.nodes.contains_key(target_id) {
            return Err(DomainError::ValidationError(
                "create_relationship: source or target node does not exist".to_string(),
            ));
        }
        graph.relationships.insert(
            id.clone(),
            RelationshipRecord {
                id: id.clone(),
                rel_type: rel_type.to_string(),
                source_id: source_id.to_string(),
                target_id: target_id.to_string(),
                properties,
            },
        );
        Ok(id)
    }

    async fn find_relationships_from(
        &self,
        _deadline: &Deadline,
        rel_type: &str,
        source_id: &str,
    ) -> DomainResult<Vec<RelationshipRecord>> {
        let graph = self.graph.read().await;
        Ok(graph
            .relationships
            .values()
            .filter(|r| r.rel_type == rel_type && r.source_id == source_id)
            .cloned()
            .collect())
    }

    async fn find_relationships_to(
        &self,
        _deadline: &Deadline,
        rel_type: &str,
        target_id: &str,
    ) -> DomainResult<Vec<RelationshipRecord>> {
        let graph = self.graph.read().await;
        Ok(graph
            .relationships
            .values()
            .filter(|r| r.rel_type == rel_type && r.target_id == target_id)
            .cloned()
            .collect())
    }

    async fn delete_relationship(&self, _deadline: &Deadline, id: &str) -> DomainResult<()> {
        let mut graph = self.graph.write().await;
        graph
            .relationships
            .remove(id)
            .ok_or_else(|| DomainError::NotFound(format!("relationship {id}")))?;
        Ok(())
    }

    async fn upsert_node(
        &self,
        _deadline: &Deadline,
        label: &str,
        id: &str,
        properties: PropertyMap,
    ) -> DomainResult<()> {
        let mut graph = self.graph.write().await;
        graph.nodes.insert(
            id.to_string(),
            NodeRecord {
                id: id.to_string(),
                label: label.to_string(),
                properties,
            },
        );
        Ok(())
    }
}

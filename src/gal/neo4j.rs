// Copyright 2025 Cowboy AI, LLC.

//! [`GraphBackend`] over `neo4rs`, grounded on `dashflow-neo4j`'s
//! `Neo4jGraph` (`neo4rs::Graph::new` / `graph.execute(Query::new(..))` /
//! `result.next().await`).

use super::backend::{GraphBackend, GraphSession};
use super::record::Row;
use crate::config::Neo4jConfig;
use crate::context::Deadline;
use crate::errors::{DomainError, DomainResult};
use async_trait::async_trait;
use neo4rs::{Graph, Query};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// A connected Neo4j-compatible backend.
pub struct Neo4jBackend {
    graph: Graph,
    max_retry_time: Duration,
}

impl Neo4jBackend {
    /// `Open(config)`: establish and verify connectivity.
    #[instrument(skip(config), fields(uri = %config.uri))]
    pub async fn open(config: &Neo4jConfig, max_retry_time: Duration) -> DomainResult<Self> {
        let graph = Graph::new(&config.uri, &config.username, &config.password)
            .await
            .map_err(|e| DomainError::ConfigurationError(format!("neo4j connect failed: {e}")))?;
        Ok(Self {
            graph,
            max_retry_time,
        })
    }

    async fn execute_with_retry(
        &self,
        statement: &str,
        params: HashMap<String, serde_json::Value>,
        columns: &[&str],
    ) -> DomainResult<Vec<Row>> {
        let mut query = Query::new(statement.to_string());
        for (key, value) in &params {
            query = bind_param(query, key, value);
        }

        let started = std::time::Instant::now();
        let mut backoff = Duration::from_millis(50);
        loop {
            match self.graph.execute(query.clone()).await {
                Ok(mut stream) => {
                    let mut rows = Vec::new();
                    loop {
                        match stream.next().await {
                            Ok(Some(row)) => rows.push(row_to_ordered_map(&row, columns, statement)?),
                            Ok(None) => break,
                            Err(e) => {
                                return Err(DomainError::QueryError {
                                    message: e.to_string(),
                                    statement: statement.to_string(),
                                })
                            }
                        }
                    }
                    return Ok(rows);
                }
                Err(e) if started.elapsed() < self.max_retry_time => {
                    warn!(error = %e, "neo4j query failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(5));
                }
                Err(e) => {
                    return Err(DomainError::BackendUnavailable(e.to_string()));
                }
            }
        }
    }
}

fn bind_param(query: Query, key: &str, value: &serde_json::Value) -> Query {
    match value {
        serde_json::Value::String(s) => query.param(key, s.clone()),
        serde_json::Value::Bool(b) => query.param(key, *b),
        serde_json::Value::Number(n) if n.is_i64() => query.param(key, n.as_i64().unwrap()),
        serde_json::Value::Number(n) => query.param(key, n.as_f64().unwrap_or(0.0)),
        other => query.param(key, other.to_string()),
    }
}

/// Build an ordered name->value map by reading `columns` off `row` by name.
/// `neo4rs::Row` has no way to enumerate an arbitrary statement's columns on
/// its own, but it does support `get`-by-name against a column alias, and
/// every statement this crate sends is written by
/// [`super::store::Neo4jStore`] itself, which always knows its own `RETURN`
/// aliases.
fn row_to_ordered_map(row: &neo4rs::Row, columns: &[&str], statement: &str) -> DomainResult<Row> {
    let mut map = Row::new();
    for &column in columns {
        let value: serde_json::Value =
            row.get(column).map_err(|e| DomainError::QueryError {
                message: format!("column `{column}`: {e}"),
                statement: statement.to_string(),
            })?;
        map.insert(column.to_string(), value);
    }
    Ok(map)
}

#[async_trait]
impl GraphBackend for Neo4jBackend {
    #[instrument(skip(self, params), fields(statement = %statement))]
    async fn query(
        &self,
        deadline: &Deadline,
        statement: &str,
        params: HashMap<String, serde_json::Value>,
        columns: &[&str],
    ) -> DomainResult<Vec<Row>> {
        debug!("executing query");
        deadline
            .run(self.execute_with_retry(statement, params, columns))
            .await
    }

    async fn session(&self) -> DomainResult<Box<dyn GraphSession>> {
        let txn = self
            .graph
            .start_txn()
            .await
            .map_err(|e| DomainError::BackendUnavailable(e.to_string()))?;
        Ok(Box::new(Neo4jSession { txn: Some(txn) }))
    }
}

struct Neo4jSession {
    txn: Option<neo4rs::Txn>,
}

#[async_trait]
impl GraphSession for Neo4jSession {
    async fn run(
        &mut self,
        statement: &str,
        params: HashMap<String, serde_json::Value>,
    ) -> DomainResult<Vec<Row>> {
        let txn = self
            .txn
            .as_mut()
            .expect("session used after close/rollback");
        let mut query = Query::new(statement.to_string());
        for (key, value) in &params {
            query = bind_param(query, key, value);
        }
        txn.run(query).await.map_err(|e| DomainError::QueryError {
            message: e.to_string(),
            statement: statement.to_string(),
        })?;
        Ok(Vec::new())
    }

    async fn close(mut self: Box<Self>) -> DomainResult<()> {
        let txn = self.txn.take().expect("session used after close/rollback");
        txn.commit()
            .await
            .map_err(|e| DomainError::BackendUnavailable(e.to_string()))
    }

    async fn rollback(mut self: Box<Self>) -> DomainResult<()> {
        let txn = self.txn.take().expect("session used after close/rollback");
        txn.rollback()
            .await
            .map_err(|e| DomainError::BackendUnavailable(e.to_string()))
    }
}

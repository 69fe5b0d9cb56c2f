// Copyright 2025 Cowboy AI, LLC.

//! The literal GAL contract (§4.1): `Open`, `Query`, `Session`.
//!
//! `Pool` is not a method on this trait — it is [`super::pool::ConnectionPool`],
//! which hands out `Arc<dyn GraphBackend>` handles.

use super::record::Row;
use crate::context::Deadline;
use crate::errors::DomainResult;
use async_trait::async_trait;
use std::collections::HashMap;

/// A connected graph backend: the literal `Query`/`Session` surface of §4.1.
///
/// `Open` itself is not a trait method — it is the backend's own
/// constructor (e.g. [`super::neo4j::Neo4jBackend::open`]), since it needs
/// backend-specific configuration and has no meaningful dynamic dispatch
/// before a connection exists.
#[async_trait]
pub trait GraphBackend: Send + Sync {
    /// Execute a parameterized statement in an implicit transaction.
    ///
    /// `columns` names the statement's own `RETURN` aliases, in the order
    /// the caller wants them read back; pass `&[]` for statements with no
    /// `RETURN` clause. The backend has no way to discover a statement's
    /// output shape on its own, so the caller — which wrote the `RETURN`
    /// clause — is the one place that can supply it.
    ///
    /// Fails with [`crate::errors::DomainError::QueryError`] on
    /// syntax/validation, `BackendUnavailable` on transport loss (after
    /// internal retry is exhausted), `Timeout` when `deadline` elapses
    /// first.
    async fn query(
        &self,
        deadline: &Deadline,
        statement: &str,
        params: HashMap<String, serde_json::Value>,
        columns: &[&str],
    ) -> DomainResult<Vec<Row>>;

    /// Open a session: a handle that groups further statements into a
    /// single transaction.
    async fn session(&self) -> DomainResult<Box<dyn GraphSession>>;
}

/// A transactional session (§4.1: "commits on `Close` without error, rolls
/// back on any error").
#[async_trait]
pub trait GraphSession: Send {
    /// Run one statement within this session's transaction.
    async fn run(
        &mut self,
        statement: &str,
        params: HashMap<String, serde_json::Value>,
    ) -> DomainResult<Vec<Row>>;

    /// Commit the transaction and consume the session.
    async fn close(self: Box<Self>) -> DomainResult<()>;

    /// Roll back the transaction and consume the session. Called
    /// automatically by callers on any statement error; exposed directly
    /// for callers that want to abort a successful sequence deliberately.
    async fn rollback(self: Box<Self>) -> DomainResult<()>;
}

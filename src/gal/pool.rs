// Copyright 2025 Cowboy AI, LLC.

//! The GAL's connection pool (§4.1 `Pool`).
//!
//! `neo4rs::Graph` already multiplexes a bolt connection pool internally, so
//! this pool does not hold multiple physical connections — it holds a
//! single shared backend handle behind a [`tokio::sync::Semaphore`] sized to
//! `pool.size`, bounding *concurrent callers* the way the spec's `Pool`
//! bounds concurrent connections. "The pool never hands out the same
//! connection to two concurrent callers" then holds trivially: a permit is
//! the connection, for the purposes of this contract.

use crate::errors::{DomainError, DomainResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};

use super::backend::GraphBackend;

/// A bounded pool of handles to one [`GraphBackend`].
pub struct ConnectionPool {
    backend: Arc<dyn GraphBackend>,
    permits: Semaphore,
    wait: Duration,
}

impl ConnectionPool {
    /// Build a pool of `size` concurrent slots over `backend`, with
    /// `wait_ms` as the acquire timeout.
    pub fn new(backend: Arc<dyn GraphBackend>, size: usize, wait_ms: u64) -> Self {
        Self {
            backend,
            permits: Semaphore::new(size),
            wait: Duration::from_millis(wait_ms),
        }
    }

    /// Acquire a connection. Blocks up to the configured wait bound, then
    /// fails with [`DomainError::PoolExhausted`].
    pub async fn acquire(&self) -> DomainResult<PooledConnection<'_>> {
        let waited = std::time::Instant::now();
        let permit = tokio::time::timeout(self.wait, self.permits.acquire())
            .await
            .map_err(|_| DomainError::PoolExhausted {
                waited_ms: waited.elapsed().as_millis() as u64,
            })?
            .expect("pool semaphore is never closed");
        Ok(PooledConnection {
            backend: self.backend.clone(),
            _permit: permit,
        })
    }

    /// Number of slots currently available.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

/// A leased connection; the slot is released when this value is dropped.
pub struct PooledConnection<'a> {
    backend: Arc<dyn GraphBackend>,
    _permit: SemaphorePermit<'a>,
}

impl<'a> PooledConnection<'a> {
    /// The underlying backend handle.
    pub fn backend(&self) -> &Arc<dyn GraphBackend> {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Deadline;
    use crate::gal::backend::GraphSession;
    use crate::gal::record::Row;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct StubBackend;

    #[async_trait]
    impl GraphBackend for StubBackend {
        async fn query(
            &self,
            _deadline: &Deadline,
            _statement: &str,
            _params: HashMap<String, serde_json::Value>,
            _columns: &[&str],
        ) -> DomainResult<Vec<Row>> {
            Ok(Vec::new())
        }

        async fn session(&self) -> DomainResult<Box<dyn GraphSession>> {
            unimplemented!("not needed for pool tests")
        }
    }

    #[tokio::test]
    async fn acquire_releases_slot_on_drop() {
        let pool = ConnectionPool::new(Arc::new(StubBackend), 1, 1_000);
        assert_eq!(pool.available(), 1);
        {
            let _conn = pool.acquire().await.unwrap();
            assert_eq!(pool.available(), 0);
        }
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn acquire_times_out_when_exhausted() {
        let pool = ConnectionPool::new(Arc::new(StubBackend), 1, 50);
        let _held = pool.acquire().await.unwrap();
        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, DomainError::PoolExhausted { .. }));
    }
}

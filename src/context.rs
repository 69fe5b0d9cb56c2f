// Copyright 2025 Cowboy AI, LLC.

//! Deadline propagation.
//!
//! Every public operation in this crate accepts an optional [`Deadline`] so
//! that "respect the caller's deadline context" (§5) is explicit rather than
//! implied. Backend round-trips and blocking points (pool acquisition, event
//! queue backpressure) race the remaining budget against their own work.

use crate::errors::{DomainError, DomainResult};
use std::future::Future;
use std::time::{Duration, Instant};

/// A deadline for a single logical operation.
///
/// Cloning a `Deadline` does not reset it — clones share the same instant in
/// time, so propagating a deadline into nested calls still expires at the
/// original bound.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Option<Instant>,
}

impl Deadline {
    /// A deadline that never expires.
    pub fn none() -> Self {
        Self { expires_at: None }
    }

    /// A deadline expiring `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self {
            expires_at: Some(Instant::now() + timeout),
        }
    }

    /// Time remaining before the deadline, or `None` if unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// True if the deadline has already elapsed.
    pub fn is_expired(&self) -> bool {
        matches!(self.remaining(), Some(d) if d.is_zero())
    }

    /// Race `fut` against the deadline. Returns [`DomainError::Timeout`] if
    /// the deadline elapses first.
    pub async fn run<F, T>(&self, fut: F) -> DomainResult<T>
    where
        F: Future<Output = DomainResult<T>>,
    {
        match self.remaining() {
            None => fut.await,
            Some(budget) => {
                let started = Instant::now();
                match tokio::time::timeout(budget, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(DomainError::Timeout {
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    }),
                }
            }
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}

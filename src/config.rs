// Copyright 2025 Cowboy AI, LLC.

//! Fabric configuration.
//!
//! This module defines the shape of every recognized configuration option
//! in §6 and nothing else: reading the record from a file, environment, or
//! CLI flags is the job of an out-of-scope collaborator. Unknown keys are
//! rejected by `serde(deny_unknown_fields)` at deserialization time, rather
//! than silently ignored, so a typo in a config file surfaces immediately
//! as a [`crate::errors::DomainError::ConfigurationError`].

use crate::errors::{DomainError, DomainResult};
use serde::{Deserialize, Serialize};

/// Connection settings for one graph backend (individual or shared).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Neo4jConfig {
    /// Bolt URI, e.g. `bolt://localhost:7687`.
    pub uri: String,
    /// Authentication username.
    pub username: String,
    /// Authentication password.
    pub password: String,
    /// Database name within the backend.
    #[serde(default = "default_database")]
    pub database: String,
}

fn default_database() -> String {
    "neo4j".to_string()
}

/// GAL pool sizing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    /// Number of pooled connections.
    pub size: usize,
    /// How long an `acquire()` waits before failing with `PoolExhausted`.
    pub wait_ms: u64,
    /// Total wall-clock budget for the GAL's internal `BackendUnavailable`
    /// retry loop.
    pub max_retry_time_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 10,
            wait_ms: 5_000,
            max_retry_time_ms: 30_000,
        }
    }
}

/// Event pipeline sizing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventsConfig {
    /// Bounded dispatch queue capacity, divided evenly across
    /// `worker_count` per-source shards.
    pub queue_capacity: usize,
    /// Number of worker tasks draining the queue. Each emitting source is
    /// pinned to one worker's shard, so events from the same source are
    /// always dispatched in emission order regardless of this value.
    pub worker_count: usize,
    /// How long `Log` blocks when the queue is full before failing with
    /// `BackpressureExceeded`.
    pub backpressure_wait_ms: u64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1_024,
            worker_count: 4,
            backpressure_wait_ms: 250,
        }
    }
}

/// Associative memory scoring weights and decay.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Weight on context match in `RecallByContext` scoring.
    pub alpha: f32,
    /// Weight on importance (decayed) in `RecallByContext` scoring.
    pub beta: f32,
    /// Weight on semantic similarity in `RecallByContext` scoring.
    pub gamma: f32,
    /// Decay constant `λ` for `importance_now`.
    pub decay_lambda: f32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            beta: 0.3,
            gamma: 0.2,
            decay_lambda: 0.01,
        }
    }
}

/// Synchronizer sizing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Default period for `cadence = scheduled` rules that don't specify
    /// their own.
    pub default_period_ms: u64,
    /// Capacity of the Synchronizer's priority queue.
    pub priority_queue_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_period_ms: 60_000,
            priority_queue_capacity: 256,
        }
    }
}

/// Which embedding provider (if any) is active.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderKind {
    /// No provider: `semanticSim` always contributes zero.
    #[default]
    None,
    /// A named provider supplied by the LLM-integration collaborator at
    /// wiring time.
    Named(String),
}

/// The complete, recognized configuration surface of the knowledge fabric.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FabricConfig {
    /// Individual (per-agent/local) graph backend.
    pub neo4j: Neo4jConfig,
    /// Shared (global) graph backend. Absent disables dual mode — only the
    /// individual graph operates.
    #[serde(default)]
    pub neo4j_shared: Option<Neo4jConfig>,
    /// GAL pool sizing.
    #[serde(default)]
    pub pool: PoolConfig,
    /// Event pipeline sizing.
    #[serde(default)]
    pub events: EventsConfig,
    /// Associative memory scoring.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Synchronizer sizing.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Embedding provider selection.
    #[serde(default)]
    pub embedding_provider: EmbeddingProviderKind,
}

impl FabricConfig {
    /// True when a shared graph backend is configured and dual-knowledge
    /// mode is active.
    pub fn dual_mode_enabled(&self) -> bool {
        self.neo4j_shared.is_some()
    }

    /// Validate cross-field constraints that serde's per-field defaults
    /// cannot express.
    pub fn validate(&self) -> DomainResult<()> {
        if self.neo4j.uri.is_empty() {
            return Err(DomainError::ConfigurationError(
                "neo4j.uri must not be empty".to_string(),
            ));
        }
        if self.pool.size == 0 {
            return Err(DomainError::ConfigurationError(
                "pool.size must be at least 1".to_string(),
            ));
        }
        if self.events.worker_count == 0 {
            return Err(DomainError::ConfigurationError(
                "events.worker_count must be at least 1".to_string(),
            ));
        }
        if let Some(shared) = &self.neo4j_shared {
            if shared.uri.is_empty() {
                return Err(DomainError::ConfigurationError(
                    "neo4j.shared.uri must not be empty when present".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> FabricConfig {
        FabricConfig {
            neo4j: Neo4jConfig {
                uri: "bolt://localhost:7687".to_string(),
                username: "neo4j".to_string(),
                password: "secret".to_string(),
                database: default_database(),
            },
            neo4j_shared: None,
            pool: PoolConfig::default(),
            events: EventsConfig::default(),
            memory: MemoryConfig::default(),
            sync: SyncConfig::default(),
            embedding_provider: EmbeddingProviderKind::None,
        }
    }

    #[test]
    fn dual_mode_disabled_without_shared_backend() {
        assert!(!minimal().dual_mode_enabled());
    }

    #[test]
    fn dual_mode_enabled_with_shared_backend() {
        let mut config = minimal();
        config.neo4j_shared = Some(config.neo4j.clone());
        assert!(config.dual_mode_enabled());
    }

    #[test]
    fn empty_uri_is_a_configuration_error() {
        let mut config = minimal();
        config.neo4j.uri.clear();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, DomainError::ConfigurationError(_)));
    }

    #[test]
    fn zero_pool_size_is_a_configuration_error() {
        let mut config = minimal();
        config.pool.size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_field_is_rejected_at_deserialization() {
        let json = r#"{
            "neo4j": {"uri": "bolt://x", "username": "a", "password": "b"},
            "bogus_field": true
        }"#;
        let result: Result<FabricConfig, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn defaults_fill_in_missing_sections() {
        let json = r#"{
            "neo4j": {"uri": "bolt://x", "username": "a", "password": "b"}
        }"#;
        let config: FabricConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.pool.size, PoolConfig::default().size);
        assert!(!config.dual_mode_enabled());
    }
}

// Copyright 2025 Cowboy AI, LLC.

//! The Memory record (§4.5).

use crate::entity::{EntityId, MemoryMarker};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The kind of memory, affecting only `RecallByType` ordering — all types
/// share the same scoring formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// A specific, situated experience.
    Episodic,
    /// General, context-independent knowledge.
    Semantic,
    /// Short-lived, task-scoped state.
    Working,
    /// Learned "how to" knowledge.
    Procedural,
}

/// A context-tagged memory record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    /// Unique id.
    pub id: EntityId<MemoryMarker>,
    /// Opaque content.
    pub content: String,
    /// Tag -> value context map.
    pub context: HashMap<String, String>,
    /// Which kind of memory this is.
    pub memory_type: MemoryType,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Base importance, in `[0, 1]`.
    pub importance: f32,
    /// Last time this memory was recalled.
    pub last_accessed: DateTime<Utc>,
    /// Number of times recalled.
    pub access_count: u64,
    /// Embedding of `(content, context)`, if an embedding provider is
    /// configured.
    pub embedding: Option<Vec<f32>>,
}

impl Memory {
    /// Build a new memory, stamped `timestamp = last_accessed = now`,
    /// `access_count = 0`.
    pub fn new(
        content: impl Into<String>,
        context: HashMap<String, String>,
        memory_type: MemoryType,
        importance: f32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EntityId::new(),
            content: content.into(),
            context,
            memory_type,
            timestamp: now,
            importance: importance.clamp(0.0, 1.0),
            last_accessed: now,
            access_count: 0,
            embedding: None,
        }
    }

    /// `importance_now = importance · exp(-λ · age)`, applied lazily.
    pub fn importance_now(&self, now: DateTime<Utc>, decay_lambda: f32) -> f32 {
        let age_seconds = (now - self.timestamp).num_seconds().max(0) as f32;
        self.importance * (-decay_lambda * age_seconds).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn importance_decays_with_age() {
        let now = Utc::now();
        let memory = Memory::new("x", HashMap::new(), MemoryType::Episodic, 1.0, now);
        let later = now + Duration::seconds(100);
        let decayed = memory.importance_now(later, 0.01);
        assert!(decayed < 1.0);
        assert!(decayed > 0.0);
    }

    #[test]
    fn importance_is_clamped_on_construction() {
        let memory = Memory::new("x", HashMap::new(), MemoryType::Working, 1.5, Utc::now());
        assert_eq!(memory.importance, 1.0);
    }
}

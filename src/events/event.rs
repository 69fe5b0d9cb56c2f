// Copyright 2025 Cowboy AI, LLC.

//! The event shape (§4.4).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A reference to a node involved in an event, by label and id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeReference {
    /// The node's label.
    pub label: String,
    /// The node's id, as a string.
    pub id: String,
}

/// An immutable record of a happening. Once logged, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique event id.
    pub id: Uuid,
    /// A dotted type string, e.g. `"agent.action"`, `"workflow.step.completed"`.
    pub event_type: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// The emitting component name or agent id.
    pub source: String,
    /// Opaque, caller-defined metadata.
    pub metadata: HashMap<String, serde_json::Value>,
    /// Nodes this event concerns.
    pub related: Vec<NodeReference>,
}

impl Event {
    /// Build a new event with a fresh id, stamped `timestamp`.
    pub fn new(
        event_type: impl Into<String>,
        source: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            timestamp,
            source: source.into(),
            metadata: HashMap::new(),
            related: Vec::new(),
        }
    }

    /// Builder-style metadata attachment.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Builder-style related-node attachment.
    pub fn with_related(mut self, label: impl Into<String>, id: impl Into<String>) -> Self {
        self.related.push(NodeReference {
            label: label.into(),
            id: id.into(),
        });
        self
    }
}

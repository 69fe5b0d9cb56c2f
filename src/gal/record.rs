// Copyright 2025 Cowboy AI, LLC.

//! Wire-level row shapes returned by the GAL, before a Repository maps them
//! onto a typed [`crate::model`] struct.

use crate::model::PropertyMap;
use serde::{Deserialize, Serialize};

/// One row of a `Query` result: an ordered name -> value map, matching
/// §4.1's "rows are returned as ordered collections of name->value pairs".
pub type Row = indexmap::IndexMap<String, serde_json::Value>;

/// A node read back from the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// The node's id, as a string (the GAL is label-agnostic at this layer).
    pub id: String,
    /// The node's label, e.g. `"Project"`.
    pub label: String,
    /// Its properties.
    pub properties: PropertyMap,
}

/// A relationship read back from the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    /// The relationship's id.
    pub id: String,
    /// The relationship type name, e.g. `"DEPENDS_ON"`.
    pub rel_type: String,
    /// Id of the source node.
    pub source_id: String,
    /// Id of the target node.
    pub target_id: String,
    /// Its properties.
    pub properties: PropertyMap,
}

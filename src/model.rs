// Copyright 2025 Cowboy AI, LLC.

//! Core node-label structs (§3).
//!
//! Each struct mirrors one node label from the data model. They carry a
//! phantom-typed [`EntityId`] from [`crate::entity`] plus the
//! label-specific attributes; [`crate::schema`] holds the declarative
//! property/type rules these structs are expected to satisfy, and
//! [`crate::repositories`] is where they are actually read from and
//! written to the graph.

use crate::entity::{
    AgentMarker, ComponentMarker, DecisionMarker, DomainMarker, EntityId, ImplementationMarker,
    PatternMarker, ProjectMarker, RequirementMarker,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top of the ownership tree. Every non-root node has a `BELONGS_TO` path
/// terminating at some `Domain`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    /// Identifier, unique among `Domain` nodes.
    pub id: EntityId<DomainMarker>,
    /// Unique human-readable name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A project, `BELONGS_TO` exactly one `Domain`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Identifier, unique among `Project` nodes.
    pub id: EntityId<ProjectMarker>,
    /// The owning domain.
    pub domain_id: EntityId<DomainMarker>,
    /// Project name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Lifecycle status (e.g. `"active"`, `"archived"`).
    pub status: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A software component, `BELONGS_TO` exactly one `Project` and may
/// `DEPENDS_ON` other components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Identifier, unique among `Component` nodes.
    pub id: EntityId<ComponentMarker>,
    /// The owning project.
    pub project_id: EntityId<ProjectMarker>,
    /// Component name.
    pub name: String,
    /// Component kind (e.g. `"service"`, `"library"`).
    pub component_type: String,
    /// Lifecycle status.
    pub status: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A requirement, `BELONGS_TO` a `Project`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    /// Identifier, unique among `Requirement` nodes.
    pub id: EntityId<RequirementMarker>,
    /// The owning project.
    pub project_id: EntityId<ProjectMarker>,
    /// Requirement name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Requirement kind (e.g. `"functional"`, `"non_functional"`).
    pub requirement_type: String,
    /// Priority label (e.g. `"must"`, `"should"`, `"could"`).
    pub priority: String,
    /// Lifecycle status.
    pub status: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// An implementation artifact, `BELONGS_TO` a `Component` and may
/// `SATISFIES` requirements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Implementation {
    /// Identifier, unique among `Implementation` nodes.
    pub id: EntityId<ImplementationMarker>,
    /// The owning component.
    pub component_id: EntityId<ComponentMarker>,
    /// Implementation name.
    pub name: String,
    /// Repository-relative path.
    pub path: String,
    /// Source language, if known.
    pub language: Option<String>,
    /// Version string, if known.
    pub version: Option<String>,
    /// Lifecycle status.
    pub status: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A reusable design pattern, referenced by `USES_PATTERN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    /// Identifier, unique among `Pattern` nodes.
    pub id: EntityId<PatternMarker>,
    /// Pattern name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A decision record, `MADE_BY` an `Agent` and `RELATED_TO` zero or more
/// other nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Identifier, unique among `Decision` nodes.
    pub id: EntityId<DecisionMarker>,
    /// Short title.
    pub title: String,
    /// Full description.
    pub description: String,
    /// The context in which the decision was made.
    pub context: String,
    /// Lifecycle status (e.g. `"draft"`, `"approved"`).
    pub status: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A collaborating agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Identifier, unique among `Agent` nodes.
    pub id: EntityId<AgentMarker>,
    /// Display name.
    pub name: String,
    /// Agent kind (e.g. `"project_manager"`, `"requirements_analyst"`).
    pub agent_type: String,
    /// Which graph layer this agent's local knowledge lives in
    /// (`"local"` or `"global"`).
    pub layer: String,
    /// Lifecycle status.
    pub status: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Free-form properties attached to a create/update call before they are
/// validated against the Schema Registry and written to the graph.
pub type PropertyMap = HashMap<String, serde_json::Value>;

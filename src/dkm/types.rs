// Copyright 2025 Cowboy AI, LLC.

//! Registered objects of the Dual Knowledge Manager (§4.6): [`ManagedKg`],
//! [`SynchronizationRule`], [`SchemaMapping`], [`KnowledgePolicy`].

use crate::entity::{EntityId, ManagedKgMarker, PolicyMarker, SyncRuleMarker};
use crate::gal::NodeRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Whether a Managed KG is an agent-private layer or the shared layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KgKind {
    /// A per-agent private graph.
    Local,
    /// The single shared graph.
    Global,
}

/// A declared slice of the store plus a connection bound to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedKg {
    /// Identifier, unique among `ManagedKG` nodes.
    pub id: EntityId<ManagedKgMarker>,
    /// Unique name `CreateManagedKG` is idempotent under.
    pub name: String,
    /// Local or global.
    pub kind: KgKind,
    /// Free-form description.
    pub description: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Which way a [`SynchronizationRule`] moves data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// Private graph to shared graph.
    LocalToGlobal,
    /// Shared graph to a private graph.
    GlobalToLocal,
    /// Both directions, run as two unidirectional passes, local->global
    /// first.
    Bidirectional,
}

/// When a rule's jobs are triggered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cadence {
    /// Triggered by Event Pipeline events matching this type glob.
    OnEvent(String),
    /// Triggered on a fixed period.
    Scheduled(Duration),
    /// Only via `TriggerNow`.
    Manual,
}

/// A predicate over a node read back from the source graph, used both as a
/// [`SynchronizationRule`]'s filter and as a [`KnowledgePolicy`]'s veto
/// check. The `Option<&str>` is the requesting agent id, present only for
/// access-policy reads (`Synchronize` always passes `None`).
pub type NodePredicate = Arc<dyn Fn(&NodeRecord, Option<&str>) -> bool + Send + Sync>;

/// `{name, direction, filter, cadence, priority}` (§4.6).
#[derive(Clone)]
pub struct SynchronizationRule {
    /// Identifier.
    pub id: EntityId<SyncRuleMarker>,
    /// Unique rule name.
    pub name: String,
    /// Direction data moves in.
    pub direction: SyncDirection,
    /// The label this rule scans for candidates when `Synchronize` is run
    /// without an explicit `items` list.
    pub scope_label: String,
    /// Additional predicate narrowing candidates beyond `scope_label`.
    /// `None` means every node of that label is a candidate.
    pub predicate: Option<NodePredicate>,
    /// When jobs for this rule are triggered.
    pub cadence: Cadence,
    /// Scheduling priority; higher runs first when the Synchronizer's
    /// queue has multiple ready jobs.
    pub priority: i32,
}

impl fmt::Debug for SynchronizationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynchronizationRule")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("direction", &self.direction)
            .field("scope_label", &self.scope_label)
            .field("has_predicate", &self.predicate.is_some())
            .field("cadence", &self.cadence)
            .field("priority", &self.priority)
            .finish()
    }
}

/// `{name, sourceLabel, targetLabel, fieldMap, transform}` (§4.6).
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaMapping {
    /// Unique mapping name.
    pub name: String,
    /// The label this mapping reads from.
    pub source_label: String,
    /// The label this mapping writes to.
    pub target_label: String,
    /// Property renames, `old_name -> new_name`.
    pub field_map: std::collections::HashMap<String, String>,
    /// Target-side fields `Synchronize` must never overwrite once set.
    pub immutable_fields: HashSet<String>,
    /// Name of a transform registered on the
    /// [`super::manager::DualKnowledgeManager`] via `register_transform`,
    /// applied to the mapped property map after renaming.
    pub transform: Option<String>,
}

impl SchemaMapping {
    /// A mapping with no renames, no immutable fields, and no transform.
    pub fn identity(name: impl Into<String>, label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            name: name.into(),
            source_label: label.clone(),
            target_label: label,
            field_map: std::collections::HashMap::new(),
            immutable_fields: HashSet::new(),
            transform: None,
        }
    }
}

/// Whether a [`KnowledgePolicy`] governs what crosses layers or what can be
/// read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    /// Vetoes data from crossing layers in `Synchronize`.
    Sharing,
    /// Vetoes reads. Not evaluated by `Synchronize`; a hook for the
    /// knowledge surface's read path.
    Access,
}

/// `{name, kind, scope, predicate}` (§4.6).
#[derive(Clone)]
pub struct KnowledgePolicy {
    /// Identifier.
    pub id: EntityId<PolicyMarker>,
    /// Unique policy name.
    pub name: String,
    /// Sharing or access.
    pub kind: PolicyKind,
    /// Labels this policy applies to. Empty means all labels.
    pub scope: Vec<String>,
    /// Returns `true` to allow, `false` to veto.
    pub predicate: NodePredicate,
}

impl fmt::Debug for KnowledgePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KnowledgePolicy")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("scope", &self.scope)
            .finish()
    }
}

impl KnowledgePolicy {
    /// True if this policy's scope covers `label` (empty scope = all
    /// labels).
    pub fn covers(&self, label: &str) -> bool {
        self.scope.is_empty() || self.scope.iter().any(|l| l == label)
    }
}

/// Outcome counters for one `Synchronize` run, matching the Synchronizer's
/// per-rule status fields (§4.7).
#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    /// Candidates examined.
    pub items_considered: u64,
    /// Candidates successfully created or updated in the target.
    pub items_applied: u64,
    /// Candidates skipped due to a sharing-policy veto.
    pub items_vetoed: u64,
    /// Relationships deferred because an endpoint wasn't yet present in
    /// the target.
    pub items_deferred: u64,
    /// Per-candidate error messages (missing schema mapping, backend
    /// failure). A non-empty list marks the run `partial` rather than `ok`.
    pub errors: Vec<String>,
}

impl SyncOutcome {
    /// `ok` if no errors were recorded, `partial` otherwise. The
    /// Synchronizer maps a [`SyncOutcome`] fetch failure itself to
    /// `failed`.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Fold another pass's counters into this one. Used to combine a
    /// [`SyncDirection::Bidirectional`] rule's two unidirectional passes
    /// into one outcome.
    pub fn merge(&mut self, other: SyncOutcome) {
        self.items_considered += other.items_considered;
        self.items_applied += other.items_applied;
        self.items_vetoed += other.items_vetoed;
        self.items_deferred += other.items_deferred;
        self.errors.extend(other.errors);
    }
}

// Copyright 2025 Cowboy AI, LLC.

//! The Dual Knowledge Manager (§4.6): coexisting local and global graph
//! layers, promotion rules between them, and the policies governing what
//! crosses.

mod manager;
mod types;

pub use manager::DualKnowledgeManager;
pub use types::{
    Cadence, KgKind, KnowledgePolicy, ManagedKg, NodePredicate, PolicyKind, SchemaMapping,
    SyncDirection, SyncOutcome, SynchronizationRule,
};

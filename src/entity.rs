// Copyright 2025 Cowboy AI, LLC.

//! Phantom-typed node identifiers.
//!
//! Every node label in the knowledge fabric's schema (`Domain`, `Project`,
//! `Component`, …) carries a phantom-typed [`EntityId<Marker>`]. The marker
//! prevents mixing up, say, a `Project`'s id and a `Component`'s id at
//! compile time even though both are backed by the same UUID representation
//! in the graph. [`model`](crate::model)'s node-label structs hold their
//! `created_at`/`updated_at` lifecycle fields directly rather than through a
//! shared wrapper type, since they're read back off the graph as plain
//! `DateTime<Utc>` properties.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use uuid::Uuid;

/// A typed entity ID using phantom types for type safety.
///
/// These IDs are globally unique and persistent (backed by a UUID). The
/// phantom type parameter ensures that IDs for different node labels cannot
/// be mixed up at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId<T> {
    id: Uuid,
    #[serde(skip)]
    _phantom: PhantomData<T>,
}

impl<T> EntityId<T> {
    /// Create a new random entity ID.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            _phantom: PhantomData,
        }
    }

    /// Create an entity ID from a UUID (e.g. one read back from the graph).
    pub fn from_uuid(id: Uuid) -> Self {
        Self {
            id,
            _phantom: PhantomData,
        }
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.id
    }

    /// Convert to a different entity ID type. Used only at the GAL boundary
    /// where a raw id read off a row must be recast to its known label.
    pub fn cast<U>(self) -> EntityId<U> {
        EntityId {
            id: self.id,
            _phantom: PhantomData,
        }
    }
}

impl<T> fmt::Display for EntityId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl<T> Default for EntityId<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<EntityId<T>> for Uuid {
    fn from(id: EntityId<T>) -> Self {
        id.id
    }
}

impl<T> From<&EntityId<T>> for Uuid {
    fn from(id: &EntityId<T>) -> Self {
        id.id
    }
}

/// Marker for [`crate::schema::Domain`] nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomainMarker;

/// Marker for [`crate::schema::Project`] nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectMarker;

/// Marker for [`crate::schema::Component`] nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentMarker;

/// Marker for [`crate::schema::Requirement`] nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequirementMarker;

/// Marker for [`crate::schema::Implementation`] nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImplementationMarker;

/// Marker for [`crate::schema::Pattern`] nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternMarker;

/// Marker for [`crate::schema::Decision`] nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecisionMarker;

/// Marker for [`crate::schema::Agent`] nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentMarker;

/// Marker for [`crate::events::Event`] nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventMarker;

/// Marker for [`crate::memory::Memory`] nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryMarker;

/// Marker for [`crate::dkm::KnowledgePolicy`] nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyMarker;

/// Marker for [`crate::dkm::ManagedKg`] nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManagedKgMarker;

/// Marker for [`crate::dkm::SynchronizationRule`] nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncRuleMarker;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_uniqueness() {
        let a = EntityId::<ComponentMarker>::new();
        let b = EntityId::<ComponentMarker>::new();
        assert_ne!(a, b);
        assert!(!a.as_uuid().is_nil());
    }

    #[test]
    fn entity_id_from_uuid_roundtrip() {
        let uuid = Uuid::new_v4();
        let id = EntityId::<ComponentMarker>::from_uuid(uuid);
        assert_eq!(id.as_uuid(), &uuid);
        assert_eq!(format!("{id}"), format!("{uuid}"));
    }

    #[test]
    fn entity_id_cast_preserves_uuid() {
        let project_id = EntityId::<ProjectMarker>::new();
        let component_id: EntityId<ComponentMarker> = project_id.cast();
        assert_eq!(project_id.as_uuid(), component_id.as_uuid());
    }

    #[test]
    fn entity_id_serde_roundtrip() {
        let original = EntityId::<ComponentMarker>::new();
        let json = serde_json::to_string(&original).unwrap();
        let deserialized: EntityId<ComponentMarker> = serde_json::from_str(&json).unwrap();
        assert_eq!(original, deserialized);
    }

    #[test]
    fn markers_produce_distinct_uuids() {
        let ids = vec![
            EntityId::<DomainMarker>::new().as_uuid().to_owned(),
            EntityId::<ProjectMarker>::new().as_uuid().to_owned(),
            EntityId::<ComponentMarker>::new().as_uuid().to_owned(),
            EntityId::<RequirementMarker>::new().as_uuid().to_owned(),
        ];
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                assert_ne!(ids[i], ids[j]);
            }
        }
    }
}

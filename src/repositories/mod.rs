// Copyright 2025 Cowboy AI, LLC.

//! Typed per-label accessors over the GAL (§4.3).
//!
//! Grounded on the teacher's `persistence::simple_repository` /
//! `aggregate_repository_v2` shape: a typed struct wrapping a shared store
//! handle, generalized here from "one event-sourced aggregate" to "one node
//! label, CRUD against the property graph". [`NodeMapper`] is the seam that
//! lets [`Repository<T>`] stay generic: each label's Rust struct implements
//! it once, in `mappers.rs`.

mod extensions;
mod mappers;
mod relationship;

pub use relationship::RelationshipRepo;

use crate::clock::Clock;
use crate::context::Deadline;
use crate::entity::EntityId;
use crate::errors::{DomainError, DomainResult};
use crate::gal::GraphStore;
use crate::model::PropertyMap;
use crate::schema::SchemaRegistry;
use std::marker::PhantomData;
use std::sync::Arc;

/// Maps a Rust struct onto/from a property-graph node of one label.
/// Implemented once per [`crate::model`] struct.
pub trait NodeMapper: Clone + Send + Sync + Sized + 'static {
    /// Phantom marker type identifying this label's id space.
    type Marker: Send + Sync + 'static;

    /// The node label, e.g. `"Project"`.
    fn label() -> &'static str;

    /// This node's id.
    fn id(&self) -> EntityId<Self::Marker>;

    /// Replace this node's id (used only by `Create` when none was given).
    fn set_id(&mut self, id: EntityId<Self::Marker>);

    /// Stamp `created_at`/`updated_at`, both to `at` (used by `Create`).
    fn stamp_created(&mut self, at: chrono::DateTime<chrono::Utc>);

    /// Stamp `updated_at` only (used by `Update`).
    fn stamp_updated(&mut self, at: chrono::DateTime<chrono::Utc>);

    /// Render to a property map for writing to the graph (excludes `id`,
    /// which the store tracks separately).
    fn to_properties(&self) -> PropertyMap;

    /// Parse from a node's id and property map.
    fn from_properties(id: EntityId<Self::Marker>, props: &PropertyMap) -> DomainResult<Self>;
}

/// A generic, label-typed repository: `Create`/`FindByID`/`FindByProperty`/
/// `FindAll`/`Count`/`Update`/`Delete` per §4.3's common contract.
pub struct Repository<T: NodeMapper> {
    store: Arc<dyn GraphStore>,
    schema: Arc<SchemaRegistry>,
    clock: Arc<dyn Clock>,
    _marker: PhantomData<T>,
}

impl<T: NodeMapper> Repository<T> {
    /// Build a repository for label `T` over a shared store, schema
    /// registry, and clock.
    pub fn new(store: Arc<dyn GraphStore>, schema: Arc<SchemaRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            schema,
            clock,
            _marker: PhantomData,
        }
    }

    /// `Create(data)`: validate, fill `id`/timestamps, persist.
    pub async fn create(&self, deadline: &Deadline, mut entity: T) -> DomainResult<T> {
        let now = self.clock.now();
        entity.stamp_created(now);

        let props = entity.to_properties();
        let errors = self.schema.validate(T::label(), &props)?;
        if !errors.is_empty() {
            return Err(DomainError::ValidationError(errors.join("; ")));
        }

        let id_string = self
            .store
            .create_node(deadline, T::label(), props)
            .await?;
        let id = parse_id(&id_string)?;
        entity.set_id(id);
        Ok(entity)
    }

    /// `FindByID(id)`.
    pub async fn find_by_id(
        &self,
        deadline: &Deadline,
        id: EntityId<T::Marker>,
    ) -> DomainResult<Option<T>> {
        let record = self
            .store
            .get_node(deadline, T::label(), &id.as_uuid().to_string())
            .await?;
        record
            .map(|record| T::from_properties(id, &record.properties))
            .transpose()
    }

    /// `FindByProperty(name, value)`.
    pub async fn find_by_property(
        &self,
        deadline: &Deadline,
        name: &str,
        value: &serde_json::Value,
    ) -> DomainResult<Vec<T>> {
        let records = self
            .store
            .find_by_property(deadline, T::label(), name, value)
            .await?;
        records_to_entities(records)
    }

    /// `FindAll(limit, offset)`.
    pub async fn find_all(
        &self,
        deadline: &Deadline,
        limit: Option<usize>,
        offset: usize,
    ) -> DomainResult<Vec<T>> {
        let records = self.store.find_all(deadline, T::label()).await?;
        let page: Vec<_> = records
            .into_iter()
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .collect();
        records_to_entities(page)
    }

    /// `Count()`.
    pub async fn count(&self, deadline: &Deadline) -> DomainResult<u64> {
        self.store.count(deadline, T::label()).await
    }

    /// `Update(id, partial)`: rejects attempts to mutate `id` by
    /// construction (callers supply a property map, not a new id), and
    /// always advances `updated_at`.
    pub async fn update(
        &self,
        deadline: &Deadline,
        id: EntityId<T::Marker>,
        mut partial: PropertyMap,
    ) -> DomainResult<Option<T>> {
        partial.remove("id");
        partial.insert(
            "updated_at".to_string(),
            serde_json::json!(self.clock.now().to_rfc3339()),
        );
        self.store
            .update_node(deadline, T::label(), &id.as_uuid().to_string(), partial)
            .await?;
        self.find_by_id(deadline, id).await
    }

    /// `Delete(id)`: detaches all relationships in the same call, per the
    /// store's own node-delete contract.
    pub async fn delete(&self, deadline: &Deadline, id: EntityId<T::Marker>) -> DomainResult<()> {
        self.store
            .delete_node(deadline, T::label(), &id.as_uuid().to_string())
            .await
    }

    pub(crate) fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

fn parse_id<M>(raw: &str) -> DomainResult<EntityId<M>> {
    let uuid = uuid::Uuid::parse_str(raw)
        .map_err(|e| DomainError::InternalError(format!("backend returned non-uuid id: {e}")))?;
    Ok(EntityId::from_uuid(uuid))
}

fn records_to_entities<T: NodeMapper>(
    records: Vec<crate::gal::NodeRecord>,
) -> DomainResult<Vec<T>> {
    records
        .into_iter()
        .map(|record| {
            let id = parse_id(&record.id)?;
            T::from_properties(id, &record.properties)
        })
        .collect()
}

/// Typed repository aliases, one per core node label.
pub type DomainRepo = Repository<crate::model::Domain>;
pub type ProjectRepo = Repository<crate::model::Project>;
pub type ComponentRepo = Repository<crate::model::Component>;
pub type RequirementRepo = Repository<crate::model::Requirement>;
pub type ImplementationRepo = Repository<crate::model::Implementation>;
pub type PatternRepo = Repository<crate::model::Pattern>;
pub type DecisionRepo = Repository<crate::model::Decision>;
pub type AgentRepo = Repository<crate::model::Agent>;

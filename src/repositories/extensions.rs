// Copyright 2025 Cowboy AI, LLC.

//! Domain-specific repository extensions (§4.3): the handful of finder
//! methods that go beyond the common contract because they read the graph
//! topology rather than a single label's properties.

use super::{ComponentRepo, ProjectRepo, RequirementRepo};
use crate::context::Deadline;
use crate::entity::{ComponentMarker, DomainMarker, EntityId, ProjectMarker, RequirementMarker};
use crate::errors::DomainResult;
use crate::gal::GraphStore;
use crate::model::{Component, Implementation, Project, Requirement};
use crate::repositories::{ImplementationRepo, NodeMapper};
use crate::schema::relationship_types::DEPENDS_ON;

impl ProjectRepo {
    /// Projects belonging to `domain_id`.
    pub async fn find_by_domain(
        &self,
        deadline: &Deadline,
        domain_id: EntityId<DomainMarker>,
    ) -> DomainResult<Vec<Project>> {
        self.find_by_property(
            deadline,
            "domain_id",
            &serde_json::json!(domain_id.as_uuid().to_string()),
        )
        .await
    }
}

impl ComponentRepo {
    /// Components belonging to `project_id`.
    pub async fn find_by_project(
        &self,
        deadline: &Deadline,
        project_id: EntityId<ProjectMarker>,
    ) -> DomainResult<Vec<Component>> {
        self.find_by_property(
            deadline,
            "project_id",
            &serde_json::json!(project_id.as_uuid().to_string()),
        )
        .await
    }

    /// Components that `DEPENDS_ON` `component_id` (its dependents).
    pub async fn find_dependents(
        &self,
        deadline: &Deadline,
        component_id: EntityId<ComponentMarker>,
    ) -> DomainResult<Vec<Component>> {
        let relationships = self
            .store()
            .find_relationships_to(deadline, DEPENDS_ON, &component_id.as_uuid().to_string())
            .await?;
        let mut dependents = Vec::with_capacity(relationships.len());
        for relationship in relationships {
            if let Some(record) = self
                .store()
                .get_node(deadline, Component::label(), &relationship.source_id)
                .await?
            {
                let id = super::parse_id(&record.id)?;
                dependents.push(Component::from_properties(id, &record.properties)?);
            }
        }
        Ok(dependents)
    }
}

impl RequirementRepo {
    /// Requirements `IMPLEMENTS`-linked from any Implementation belonging
    /// to `component_id`.
    pub async fn find_for_component(
        &self,
        deadline: &Deadline,
        component_id: EntityId<ComponentMarker>,
    ) -> DomainResult<Vec<Requirement>> {
        let implementations = self
            .store()
            .find_by_property(
                deadline,
                Implementation::label(),
                "component_id",
                &serde_json::json!(component_id.as_uuid().to_string()),
            )
            .await?;

        let mut requirements = Vec::new();
        for implementation in implementations {
            let relationships = self
                .store()
                .find_relationships_from(
                    deadline,
                    crate::schema::relationship_types::IMPLEMENTS,
                    &implementation.id,
                )
                .await?;
            for relationship in relationships {
                if let Some(record) = self
                    .store()
                    .get_node(deadline, Requirement::label(), &relationship.target_id)
                    .await?
                {
                    let id = super::parse_id(&record.id)?;
                    requirements.push(Requirement::from_properties(id, &record.properties)?);
                }
            }
        }
        Ok(requirements)
    }
}

impl ImplementationRepo {
    /// Implementations that `SATISFIES` `requirement_id`.
    pub async fn find_for_requirement(
        &self,
        deadline: &Deadline,
        requirement_id: EntityId<RequirementMarker>,
    ) -> DomainResult<Vec<Implementation>> {
        let relationships = self
            .store()
            .find_relationships_to(
                deadline,
                crate::schema::relationship_types::SATISFIES,
                &requirement_id.as_uuid().to_string(),
            )
            .await?;
        let mut implementations = Vec::with_capacity(relationships.len());
        for relationship in relationships {
            if let Some(record) = self
                .store()
                .get_node(deadline, Implementation::label(), &relationship.source_id)
                .await?
            {
                let id = super::parse_id(&record.id)?;
                implementations.push(Implementation::from_properties(id, &record.properties)?);
            }
        }
        Ok(implementations)
    }
}

impl crate::repositories::AgentRepo {
    /// Agents in a given layer (`"local"` or `"global"`).
    pub async fn find_by_layer(
        &self,
        deadline: &Deadline,
        layer: &str,
    ) -> DomainResult<Vec<crate::model::Agent>> {
        self.find_by_property(deadline, "layer", &serde_json::json!(layer))
            .await
    }
}

// Copyright 2025 Cowboy AI, LLC.

//! [`super::NodeMapper`] implementations, one per core node label.

use super::NodeMapper;
use crate::entity::{
    AgentMarker, ComponentMarker, DecisionMarker, DomainMarker, EntityId, ImplementationMarker,
    PatternMarker, ProjectMarker, RequirementMarker,
};
use crate::errors::{DomainError, DomainResult};
use crate::model::{
    Agent, Component, Decision, Domain, Implementation, Pattern, Project, PropertyMap,
    Requirement,
};
use chrono::{DateTime, Utc};

fn required_string(props: &PropertyMap, key: &str) -> DomainResult<String> {
    props
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| DomainError::ValidationError(format!("missing required property: {key}")))
}

fn optional_string(props: &PropertyMap, key: &str) -> Option<String> {
    props.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn required_datetime(props: &PropertyMap, key: &str, fallback: DateTime<Utc>) -> DateTime<Utc> {
    props
        .get(key)
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(fallback)
}

macro_rules! stamp_methods {
    () => {
        fn stamp_created(&mut self, at: DateTime<Utc>) {
            self.created_at = at;
            self.updated_at = at;
        }

        fn stamp_updated(&mut self, at: DateTime<Utc>) {
            self.updated_at = at;
        }
    };
}

impl NodeMapper for Domain {
    type Marker = DomainMarker;

    fn label() -> &'static str {
        "Domain"
    }

    fn id(&self) -> EntityId<Self::Marker> {
        self.id
    }

    fn set_id(&mut self, id: EntityId<Self::Marker>) {
        self.id = id;
    }

    stamp_methods!();

    fn to_properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("name".to_string(), serde_json::json!(self.name));
        props.insert(
            "description".to_string(),
            serde_json::json!(self.description),
        );
        props.insert(
            "created_at".to_string(),
            serde_json::json!(self.created_at.to_rfc3339()),
        );
        props.insert(
            "updated_at".to_string(),
            serde_json::json!(self.updated_at.to_rfc3339()),
        );
        props
    }

    fn from_properties(id: EntityId<Self::Marker>, props: &PropertyMap) -> DomainResult<Self> {
        let now = Utc::now();
        Ok(Self {
            id,
            name: required_string(props, "name")?,
            description: optional_string(props, "description").unwrap_or_default(),
            created_at: required_datetime(props, "created_at", now),
            updated_at: required_datetime(props, "updated_at", now),
        })
    }
}

impl NodeMapper for Project {
    type Marker = ProjectMarker;

    fn label() -> &'static str {
        "Project"
    }

    fn id(&self) -> EntityId<Self::Marker> {
        self.id
    }

    fn set_id(&mut self, id: EntityId<Self::Marker>) {
        self.id = id;
    }

    stamp_methods!();

    fn to_properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert(
            "domain_id".to_string(),
            serde_json::json!(self.domain_id.as_uuid().to_string()),
        );
        props.insert("name".to_string(), serde_json::json!(self.name));
        props.insert(
            "description".to_string(),
            serde_json::json!(self.description),
        );
        props.insert("status".to_string(), serde_json::json!(self.status));
        props.insert(
            "created_at".to_string(),
            serde_json::json!(self.created_at.to_rfc3339()),
        );
        props.insert(
            "updated_at".to_string(),
            serde_json::json!(self.updated_at.to_rfc3339()),
        );
        props
    }

    fn from_properties(id: EntityId<Self::Marker>, props: &PropertyMap) -> DomainResult<Self> {
        let now = Utc::now();
        let domain_id = required_string(props, "domain_id")?;
        let domain_id = uuid::Uuid::parse_str(&domain_id)
            .map_err(|e| DomainError::ValidationError(format!("bad domain_id: {e}")))?;
        Ok(Self {
            id,
            domain_id: EntityId::from_uuid(domain_id),
            name: required_string(props, "name")?,
            description: optional_string(props, "description").unwrap_or_default(),
            status: required_string(props, "status")?,
            created_at: required_datetime(props, "created_at", now),
            updated_at: required_datetime(props, "updated_at", now),
        })
    }
}

impl NodeMapper for Component {
    type Marker = ComponentMarker;

    fn label() -> &'static str {
        "Component"
    }

    fn id(&self) -> EntityId<Self::Marker> {
        self.id
    }

    fn set_id(&mut self, id: EntityId<Self::Marker>) {
        self.id = id;
    }

    stamp_methods!();

    fn to_properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert(
            "project_id".to_string(),
            serde_json::json!(self.project_id.as_uuid().to_string()),
        );
        props.insert("name".to_string(), serde_json::json!(self.name));
        props.insert("type".to_string(), serde_json::json!(self.component_type));
        props.insert("status".to_string(), serde_json::json!(self.status));
        props.insert(
            "created_at".to_string(),
            serde_json::json!(self.created_at.to_rfc3339()),
        );
        props.insert(
            "updated_at".to_string(),
            serde_json::json!(self.updated_at.to_rfc3339()),
        );
        props
    }

    fn from_properties(id: EntityId<Self::Marker>, props: &PropertyMap) -> DomainResult<Self> {
        let now = Utc::now();
        let project_id = required_string(props, "project_id")?;
        let project_id = uuid::Uuid::parse_str(&project_id)
            .map_err(|e| DomainError::ValidationError(format!("bad project_id: {e}")))?;
        Ok(Self {
            id,
            project_id: EntityId::from_uuid(project_id),
            name: required_string(props, "name")?,
            component_type: required_string(props, "type")?,
            status: required_string(props, "status")?,
            created_at: required_datetime(props, "created_at", now),
            updated_at: required_datetime(props, "updated_at", now),
        })
    }
}

impl NodeMapper for Requirement {
    type Marker = RequirementMarker;

    fn label() -> &'static str {
        "Requirement"
    }

    fn id(&self) -> EntityId<Self::Marker> {
        self.id
    }

    fn set_id(&mut self, id: EntityId<Self::Marker>) {
        self.id = id;
    }

    stamp_methods!();

    fn to_properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert(
            "project_id".to_string(),
            serde_json::json!(self.project_id.as_uuid().to_string()),
        );
        props.insert("name".to_string(), serde_json::json!(self.name));
        props.insert(
            "description".to_string(),
            serde_json::json!(self.description),
        );
        props.insert(
            "type".to_string(),
            serde_json::json!(self.requirement_type),
        );
        props.insert("priority".to_string(), serde_json::json!(self.priority));
        props.insert("status".to_string(), serde_json::json!(self.status));
        props.insert(
            "created_at".to_string(),
            serde_json::json!(self.created_at.to_rfc3339()),
        );
        props.insert(
            "updated_at".to_string(),
            serde_json::json!(self.updated_at.to_rfc3339()),
        );
        props
    }

    fn from_properties(id: EntityId<Self::Marker>, props: &PropertyMap) -> DomainResult<Self> {
        let now = Utc::now();
        let project_id = required_string(props, "project_id")?;
        let project_id = uuid::Uuid::parse_str(&project_id)
            .map_err(|e| DomainError::ValidationError(format!("bad project_id: {e}")))?;
        Ok(Self {
            id,
            project_id: EntityId::from_uuid(project_id),
            name: required_string(props, "name")?,
            description: optional_string(props, "description").unwrap_or_default(),
            requirement_type: required_string(props, "type")?,
            priority: required_string(props, "priority")?,
            status: required_string(props, "status")?,
            created_at: required_datetime(props, "created_at", now),
            updated_at: required_datetime(props, "updated_at", now),
        })
    }
}

impl NodeMapper for Implementation {
    type Marker = ImplementationMarker;

    fn label() -> &'static str {
        "Implementation"
    }

    fn id(&self) -> EntityId<Self::Marker> {
        self.id
    }

    fn set_id(&mut self, id: EntityId<Self::Marker>) {
        self.id = id;
    }

    stamp_methods!();

    fn to_properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert(
            "component_id".to_string(),
            serde_json::json!(self.component_id.as_uuid().to_string()),
        );
        props.insert("name".to_string(), serde_json::json!(self.name));
        props.insert("path".to_string(), serde_json::json!(self.path));
        if let Some(language) = &self.language {
            props.insert("language".to_string(), serde_json::json!(language));
        }
        if let Some(version) = &self.version {
            props.insert("version".to_string(), serde_json::json!(version));
        }
        props.insert("status".to_string(), serde_json::json!(self.status));
        props.insert(
            "created_at".to_string(),
            serde_json::json!(self.created_at.to_rfc3339()),
        );
        props.insert(
            "updated_at".to_string(),
            serde_json::json!(self.updated_at.to_rfc3339()),
        );
        props
    }

    fn from_properties(id: EntityId<Self::Marker>, props: &PropertyMap) -> DomainResult<Self> {
        let now = Utc::now();
        let component_id = required_string(props, "component_id")?;
        let component_id = uuid::Uuid::parse_str(&component_id)
            .map_err(|e| DomainError::ValidationError(format!("bad component_id: {e}")))?;
        Ok(Self {
            id,
            component_id: EntityId::from_uuid(component_id),
            name: required_string(props, "name")?,
            path: required_string(props, "path")?,
            language: optional_string(props, "language"),
            version: optional_string(props, "version"),
            status: required_string(props, "status")?,
            created_at: required_datetime(props, "created_at", now),
            updated_at: required_datetime(props, "updated_at", now),
        })
    }
}

impl NodeMapper for Pattern {
    type Marker = PatternMarker;

    fn label() -> &'static str {
        "Pattern"
    }

    fn id(&self) -> EntityId<Self::Marker> {
        self.id
    }

    fn set_id(&mut self, id: EntityId<Self::Marker>) {
        self.id = id;
    }

    stamp_methods!();

    fn to_properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("name".to_string(), serde_json::json!(self.name));
        props.insert(
            "description".to_string(),
            serde_json::json!(self.description),
        );
        props.insert(
            "created_at".to_string(),
            serde_json::json!(self.created_at.to_rfc3339()),
        );
        props.insert(
            "updated_at".to_string(),
            serde_json::json!(self.updated_at.to_rfc3339()),
        );
        props
    }

    fn from_properties(id: EntityId<Self::Marker>, props: &PropertyMap) -> DomainResult<Self> {
        let now = Utc::now();
        Ok(Self {
            id,
            name: required_string(props, "name")?,
            description: optional_string(props, "description").unwrap_or_default(),
            created_at: required_datetime(props, "created_at", now),
            updated_at: required_datetime(props, "updated_at", now),
        })
    }
}

impl NodeMapper for Decision {
    type Marker = DecisionMarker;

    fn label() -> &'static str {
        "Decision"
    }

    fn id(&self) -> EntityId<Self::Marker> {
        self.id
    }

    fn set_id(&mut self, id: EntityId<Self::Marker>) {
        self.id = id;
    }

    stamp_methods!();

    fn to_properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("title".to_string(), serde_json::json!(self.title));
        props.insert(
            "description".to_string(),
            serde_json::json!(self.description),
        );
        props.insert("context".to_string(), serde_json::json!(self.context));
        props.insert("status".to_string(), serde_json::json!(self.status));
        props.insert(
            "created_at".to_string(),
            serde_json::json!(self.created_at.to_rfc3339()),
        );
        props.insert(
            "updated_at".to_string(),
            serde_json::json!(self.updated_at.to_rfc3339()),
        );
        props
    }

    fn from_properties(id: EntityId<Self::Marker>, props: &PropertyMap) -> DomainResult<Self> {
        let now = Utc::now();
        Ok(Self {
            id,
            title: required_string(props, "title")?,
            description: optional_string(props, "description").unwrap_or_default(),
            context: optional_string(props, "context").unwrap_or_default(),
            status: required_string(props, "status")?,
            created_at: required_datetime(props, "created_at", now),
            updated_at: required_datetime(props, "updated_at", now),
        })
    }
}

impl NodeMapper for Agent {
    type Marker = AgentMarker;

    fn label() -> &'static str {
        "Agent"
    }

    fn id(&self) -> EntityId<Self::Marker> {
        self.id
    }

    fn set_id(&mut self, id: EntityId<Self::Marker>) {
        self.id = id;
    }

    stamp_methods!();

    fn to_properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("name".to_string(), serde_json::json!(self.name));
        props.insert("type".to_string(), serde_json::json!(self.agent_type));
        props.insert("layer".to_string(), serde_json::json!(self.layer));
        props.insert("status".to_string(), serde_json::json!(self.status));
        props.insert(
            "created_at".to_string(),
            serde_json::json!(self.created_at.to_rfc3339()),
        );
        props.insert(
            "updated_at".to_string(),
            serde_json::json!(self.updated_at.to_rfc3339()),
        );
        props
    }

    fn from_properties(id: EntityId<Self::Marker>, props: &PropertyMap) -> DomainResult<Self> {
        let now = Utc::now();
        Ok(Self {
            id,
            name: required_string(props, "name")?,
            agent_type: required_string(props, "type")?,
            layer: required_string(props, "layer")?,
            status: required_string(props, "status")?,
            created_at: required_datetime(props, "created_at", now),
            updated_at: required_datetime(props, "updated_at", now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityId;

    #[test]
    fn project_roundtrips_through_properties() {
        let now = Utc::now();
        let project = Project {
            id: EntityId::new(),
            domain_id: EntityId::new(),
            name: "DC".to_string(),
            description: "desc".to_string(),
            status: "active".to_string(),
            created_at: now,
            updated_at: now,
        };
        let props = project.to_properties();
        let roundtripped = Project::from_properties(project.id, &props).unwrap();
        assert_eq!(roundtripped.name, project.name);
        assert_eq!(roundtripped.domain_id, project.domain_id);
        assert_eq!(roundtripped.status, project.status);
    }

    #[test]
    fn missing_required_property_is_a_validation_error() {
        let err = Domain::from_properties(EntityId::new(), &PropertyMap::new()).unwrap_err();
        assert!(matches!(err, DomainError::ValidationError(_)));
    }
}

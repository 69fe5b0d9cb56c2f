// Copyright 2025 Cowboy AI, LLC.

//! The Schema Registry (§4.2).
//!
//! Holds declarative definitions for every node label and relationship
//! type: the set of properties with type, required flag, and optional
//! constraints, plus the allowed source/target label sets for
//! relationships. `Initialize` turns these declarations into backend
//! statements (uniqueness constraints, lookup indexes); `Validate` checks a
//! candidate property map against them before a Repository writes it;
//! `ExtendForDomain` lets a bounded context register additional labels
//! under its own namespace.

use crate::errors::{DomainError, DomainResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Core relationship-type names (§3). Domain extensions may register more.
pub mod relationship_types {
    /// `(n)-[:BELONGS_TO]->(parent)`
    pub const BELONGS_TO: &str = "BELONGS_TO";
    /// `(component)-[:DEPENDS_ON]->(component)`
    pub const DEPENDS_ON: &str = "DEPENDS_ON";
    /// `(implementation)-[:IMPLEMENTS]->(requirement)`
    pub const IMPLEMENTS: &str = "IMPLEMENTS";
    /// `(n)-[:USES_PATTERN]->(pattern)`
    pub const USES_PATTERN: &str = "USES_PATTERN";
    /// `(decision)-[:MADE_BY]->(agent)`
    pub const MADE_BY: &str = "MADE_BY";
    /// `(implementation)-[:SATISFIES]->(requirement)`
    pub const SATISFIES: &str = "SATISFIES";
    /// `(n)-[:CONTRIBUTES_TO]->(n)`
    pub const CONTRIBUTES_TO: &str = "CONTRIBUTES_TO";
    /// `(decision)-[:RELATED_TO]->(n)`
    pub const RELATED_TO: &str = "RELATED_TO";
    /// `(event)-[:TRIGGERS]->(n)`
    pub const TRIGGERS: &str = "TRIGGERS";
    /// `(n)-[:GOVERNED_BY]->(policy)`
    pub const GOVERNED_BY: &str = "GOVERNED_BY";
    /// `(step)-[:NEXT_STEP]->(step)`
    pub const NEXT_STEP: &str = "NEXT_STEP";
    /// `(kg)-[:SYNCS_WITH]->(kg)`
    pub const SYNCS_WITH: &str = "SYNCS_WITH";
    /// `(kg)-[:SYNCS_TO]->(kg)`
    pub const SYNCS_TO: &str = "SYNCS_TO";
    /// `(rule)-[:APPLIES_TO]->(kg)`
    pub const APPLIES_TO: &str = "APPLIES_TO";
    /// `(mapping)-[:MAPS_BETWEEN]->(kg)`
    pub const MAPS_BETWEEN: &str = "MAPS_BETWEEN";
    /// `(policy)-[:GOVERNS]->(kg)`
    pub const GOVERNS: &str = "GOVERNS";
}

/// The type of a declared property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyType {
    /// UTF-8 text.
    String,
    /// 64-bit float.
    Number,
    /// Boolean flag.
    Boolean,
    /// RFC 3339 timestamp.
    DateTime,
    /// Fixed-width float vector (e.g. an embedding), with its dimension.
    Vector(usize),
}

/// A single property's declared shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertySchema {
    /// The property's type.
    pub property_type: PropertyType,
    /// Whether the property must be present on every node of this label.
    pub required: bool,
    /// Inclusive numeric bounds (e.g. `[0, 1]` for `satisfaction_level`).
    /// Only meaningful for [`PropertyType::Number`].
    pub bounds: Option<(f64, f64)>,
}

impl PropertySchema {
    /// A required string property with no further constraint.
    pub fn required_string() -> Self {
        Self {
            property_type: PropertyType::String,
            required: true,
            bounds: None,
        }
    }

    /// An optional string property.
    pub fn optional_string() -> Self {
        Self {
            property_type: PropertyType::String,
            required: false,
            bounds: None,
        }
    }

    /// A required number bounded to `[min, max]`.
    pub fn bounded_number(min: f64, max: f64) -> Self {
        Self {
            property_type: PropertyType::Number,
            required: true,
            bounds: Some((min, max)),
        }
    }
}

/// A declared node label: its properties and which are required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSchema {
    /// The label name, e.g. `"Project"`.
    pub label: String,
    /// Declared properties, in declaration order.
    pub properties: IndexMap<String, PropertySchema>,
}

impl NodeSchema {
    /// Start a new, empty label declaration.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            properties: IndexMap::new(),
        }
    }

    /// Declare a property, builder-style.
    pub fn with_property(mut self, name: impl Into<String>, schema: PropertySchema) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }
}

/// A declared relationship type: allowed endpoint labels and any
/// properties it may carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipSchema {
    /// The relationship type name, e.g. `"BELONGS_TO"`.
    pub rel_type: String,
    /// Labels permitted as the relationship's source.
    pub source_labels: HashSet<String>,
    /// Labels permitted as the relationship's target.
    pub target_labels: HashSet<String>,
    /// Declared properties the relationship may carry.
    pub properties: IndexMap<String, PropertySchema>,
}

impl RelationshipSchema {
    /// Declare a relationship type allowed between the given label sets.
    pub fn new(
        rel_type: impl Into<String>,
        source_labels: impl IntoIterator<Item = &'static str>,
        target_labels: impl IntoIterator<Item = &'static str>,
    ) -> Self {
        Self {
            rel_type: rel_type.into(),
            source_labels: source_labels.into_iter().map(String::from).collect(),
            target_labels: target_labels.into_iter().map(String::from).collect(),
            properties: IndexMap::new(),
        }
    }

    /// Declare a property the relationship may carry.
    pub fn with_property(mut self, name: impl Into<String>, schema: PropertySchema) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    /// True if `source` -> `target` is a permitted endpoint pairing.
    pub fn allows(&self, source_label: &str, target_label: &str) -> bool {
        self.source_labels.contains(source_label) && self.target_labels.contains(target_label)
    }
}

/// A single backend statement the Schema Registry wants issued at
/// bootstrap (a uniqueness constraint or a lookup/vector index).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapStatement(pub String);

/// The Schema Registry: every node label and relationship type the fabric
/// currently knows about.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    nodes: IndexMap<String, NodeSchema>,
    relationships: IndexMap<String, RelationshipSchema>,
    domain_extensions: IndexMap<String, Vec<String>>,
}

impl SchemaRegistry {
    /// An empty registry with no labels declared.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry pre-loaded with the core schema of §3.
    pub fn with_core_schema() -> Self {
        let mut registry = Self::new();
        registry.register_core_nodes();
        registry.register_core_relationships();
        registry
    }

    fn register_core_nodes(&mut self) {
        self.register_node(
            NodeSchema::new("Domain")
                .with_property("name", PropertySchema::required_string())
                .with_property("description", PropertySchema::optional_string()),
        );
        self.register_node(
            NodeSchema::new("Project")
                .with_property("name", PropertySchema::required_string())
                .with_property("description", PropertySchema::optional_string())
                .with_property("status", PropertySchema::required_string()),
        );
        self.register_node(
            NodeSchema::new("Component")
                .with_property("name", PropertySchema::required_string())
                .with_property("type", PropertySchema::required_string())
                .with_property("status", PropertySchema::required_string()),
        );
        self.register_node(
            NodeSchema::new("Requirement")
                .with_property("name", PropertySchema::required_string())
                .with_property("description", PropertySchema::optional_string())
                .with_property("type", PropertySchema::required_string())
                .with_property("priority", PropertySchema::required_string())
                .with_property("status", PropertySchema::required_string()),
        );
        self.register_node(
            NodeSchema::new("Implementation")
                .with_property("name", PropertySchema::required_string())
                .with_property("path", PropertySchema::required_string())
                .with_property("language", PropertySchema::optional_string())
                .with_property("version", PropertySchema::optional_string())
                .with_property("status", PropertySchema::required_string()),
        );
        self.register_node(
            NodeSchema::new("Pattern")
                .with_property("name", PropertySchema::required_string())
                .with_property("description", PropertySchema::optional_string()),
        );
        self.register_node(
            NodeSchema::new("Decision")
                .with_property("title", PropertySchema::required_string())
                .with_property("description", PropertySchema::optional_string())
                .with_property("context", PropertySchema::optional_string())
                .with_property("status", PropertySchema::required_string()),
        );
        self.register_node(
            NodeSchema::new("Agent")
                .with_property("name", PropertySchema::required_string())
                .with_property("type", PropertySchema::required_string())
                .with_property("layer", PropertySchema::required_string())
                .with_property("status", PropertySchema::required_string()),
        );
        self.register_node(
            NodeSchema::new("Memory")
                .with_property("content", PropertySchema::required_string())
                .with_property("memory_type", PropertySchema::required_string())
                .with_property("importance", PropertySchema::bounded_number(0.0, 1.0)),
        );
        self.register_node(NodeSchema::new("Event"));
        self.register_node(NodeSchema::new("Policy"));
        self.register_node(
            NodeSchema::new("ManagedKG")
                .with_property("name", PropertySchema::required_string())
                .with_property("kind", PropertySchema::required_string())
                .with_property("description", PropertySchema::optional_string()),
        );
    }

    fn register_core_relationships(&mut self) {
        use relationship_types::*;
        let all_labels = [
            "Domain",
            "Project",
            "Component",
            "Requirement",
            "Implementation",
            "Pattern",
            "Decision",
            "Agent",
            "Event",
            "Memory",
            "Policy",
            "ManagedKG",
        ];
        self.register_relationship(RelationshipSchema::new(
            BELONGS_TO,
            all_labels,
            all_labels,
        ));
        self.register_relationship(RelationshipSchema::new(
            DEPENDS_ON,
            ["Component"],
            ["Component"],
        ).with_property("dependency_type", PropertySchema::optional_string()));
        self.register_relationship(RelationshipSchema::new(
            IMPLEMENTS,
            ["Implementation"],
            ["Requirement"],
        ));
        self.register_relationship(RelationshipSchema::new(
            USES_PATTERN,
            all_labels,
            ["Pattern"],
        ));
        self.register_relationship(RelationshipSchema::new(MADE_BY, ["Decision"], ["Agent"]));
        self.register_relationship(
            RelationshipSchema::new(SATISFIES, ["Implementation"], ["Requirement"])
                .with_property("satisfaction_level", PropertySchema::bounded_number(0.0, 1.0)),
        );
        self.register_relationship(RelationshipSchema::new(
            CONTRIBUTES_TO,
            all_labels,
            all_labels,
        ));
        self.register_relationship(RelationshipSchema::new(
            RELATED_TO,
            all_labels,
            all_labels,
        ));
        self.register_relationship(RelationshipSchema::new(TRIGGERS, ["Event"], all_labels));
        self.register_relationship(RelationshipSchema::new(
            GOVERNED_BY,
            all_labels,
            ["Policy"],
        ));
        self.register_relationship(RelationshipSchema::new(NEXT_STEP, all_labels, all_labels));
        self.register_relationship(RelationshipSchema::new(
            SYNCS_WITH,
            ["ManagedKG"],
            ["ManagedKG"],
        ));
        self.register_relationship(RelationshipSchema::new(
            SYNCS_TO,
            ["ManagedKG"],
            ["ManagedKG"],
        ));
        self.register_relationship(RelationshipSchema::new(
            APPLIES_TO,
            all_labels,
            ["ManagedKG"],
        ));
        self.register_relationship(RelationshipSchema::new(
            MAPS_BETWEEN,
            all_labels,
            ["ManagedKG"],
        ));
        self.register_relationship(RelationshipSchema::new(
            GOVERNS,
            ["Policy"],
            ["ManagedKG"],
        ));
    }

    /// Register (or overwrite) a node label declaration directly.
    pub fn register_node(&mut self, schema: NodeSchema) {
        self.nodes.insert(schema.label.clone(), schema);
    }

    /// Register (or overwrite) a relationship type declaration directly.
    pub fn register_relationship(&mut self, schema: RelationshipSchema) {
        self.relationships.insert(schema.rel_type.clone(), schema);
    }

    /// Look up a node label's schema.
    pub fn node(&self, label: &str) -> Option<&NodeSchema> {
        self.nodes.get(label)
    }

    /// Look up a relationship type's schema.
    pub fn relationship(&self, rel_type: &str) -> Option<&RelationshipSchema> {
        self.relationships.get(rel_type)
    }

    /// All declared node labels, in declaration order.
    pub fn node_labels(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// All declared relationship type names, in declaration order.
    pub fn relationship_types(&self) -> impl Iterator<Item = &str> {
        self.relationships.keys().map(String::as_str)
    }

    /// Issue the backend statements `Initialize()` requires: a uniqueness
    /// constraint on every label's `id`, plus lookup indexes on
    /// `name`/`type`/`status` when declared, and a vector-similarity index
    /// on `Memory.embedding` if the backend supports it.
    pub fn bootstrap_statements(&self) -> Vec<BootstrapStatement> {
        let mut statements = Vec::new();
        for label in self.nodes.keys() {
            statements.push(BootstrapStatement(format!(
                "CREATE CONSTRAINT IF NOT EXISTS FOR (n:{label}) REQUIRE n.id IS UNIQUE"
            )));
        }
        for (label, schema) in &self.nodes {
            for indexed in ["name", "type", "status"] {
                if schema.properties.contains_key(indexed) {
                    statements.push(BootstrapStatement(format!(
                        "CREATE INDEX IF NOT EXISTS FOR (n:{label}) ON (n.{indexed})"
                    )));
                }
            }
        }
        if self.nodes.contains_key("Memory") {
            statements.push(BootstrapStatement(
                "CREATE VECTOR INDEX memory_embedding IF NOT EXISTS FOR (n:Memory) ON n.embedding"
                    .to_string(),
            ));
        }
        statements
    }

    /// Validate a candidate property map against a label's declared schema.
    /// Returns every missing required property and every type/bounds
    /// mismatch; an empty vector means the map is valid.
    pub fn validate(
        &self,
        label: &str,
        props: &crate::model::PropertyMap,
    ) -> DomainResult<Vec<String>> {
        let schema = self
            .nodes
            .get(label)
            .ok_or_else(|| DomainError::ValidationError(format!("unknown label: {label}")))?;

        let mut errors = Vec::new();
        for (name, property_schema) in &schema.properties {
            match props.get(name) {
                None => {
                    if property_schema.required {
                        errors.push(format!("missing required property: {name}"));
                    }
                }
                Some(value) => {
                    if let Some(message) = type_mismatch(property_schema, value) {
                        errors.push(format!("{name}: {message}"));
                    }
                }
            }
        }
        Ok(errors)
    }

    /// Register additional labels and relationship types under a domain
    /// namespace. Fails with [`DomainError::SchemaConflict`] if an existing
    /// label would be redefined incompatibly (a different, already-declared
    /// property keeps a different type).
    pub fn extend_for_domain(
        &mut self,
        domain_name: &str,
        extension_nodes: Vec<NodeSchema>,
    ) -> DomainResult<()> {
        for candidate in &extension_nodes {
            if let Some(existing) = self.nodes.get(&candidate.label) {
                for (prop_name, prop_schema) in &candidate.properties {
                    if let Some(existing_prop) = existing.properties.get(prop_name) {
                        if existing_prop.property_type != prop_schema.property_type {
                            return Err(DomainError::SchemaConflict(format!(
                                "domain '{domain_name}' redefines {}.{prop_name} incompatibly",
                                candidate.label
                            )));
                        }
                    }
                }
            }
        }

        let mut registered = Vec::with_capacity(extension_nodes.len());
        for node in extension_nodes {
            registered.push(node.label.clone());
            self.register_node(node);
        }
        self.domain_extensions
            .entry(domain_name.to_string())
            .or_default()
            .extend(registered);
        Ok(())
    }

    /// Labels registered under a given domain's extension namespace.
    pub fn extensions_for_domain(&self, domain_name: &str) -> &[String] {
        self.domain_extensions
            .get(domain_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn type_mismatch(schema: &PropertySchema, value: &serde_json::Value) -> Option<String> {
    use serde_json::Value;
    match (&schema.property_type, value) {
        (PropertyType::String, Value::String(_)) => None,
        (PropertyType::Number, Value::Number(n)) => {
            if let Some((min, max)) = schema.bounds {
                let as_f64 = n.as_f64().unwrap_or(f64::NAN);
                if as_f64 < min || as_f64 > max {
                    return Some(format!("value {as_f64} out of bounds [{min}, {max}]"));
                }
            }
            None
        }
        (PropertyType::Boolean, Value::Bool(_)) => None,
        (PropertyType::DateTime, Value::String(s)) => {
            if chrono::DateTime::parse_from_rfc3339(s).is_err() {
                Some("expected an RFC 3339 datetime string".to_string())
            } else {
                None
            }
        }
        (PropertyType::Vector(dim), Value::Array(items)) => {
            if items.len() != *dim {
                Some(format!("expected vector of length {dim}, got {}", items.len()))
            } else {
                None
            }
        }
        (expected, _) => Some(format!("expected {expected:?}")),
    }
}

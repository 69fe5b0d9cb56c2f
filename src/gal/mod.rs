// Copyright 2025 Cowboy AI, LLC.

//! The Graph Access Layer (§4.1).
//!
//! Two traits, not one. [`backend::GraphBackend`] is the literal contract of
//! `Open`/`Query`/`Session`/`Pool`: a thin wrapper over a Cypher-style
//! dialect on a bolt-style connection, grounded directly on `neo4rs::Graph`/
//! `neo4rs::Query` the way `dashflow-neo4j`'s `Neo4jGraph` wraps them.
//! [`store::GraphStore`] sits above it: structured node/relationship CRUD
//! against typed property maps, the seam [`crate::repositories`] actually
//! programs against (grounded on the trait-first storage split in the
//! `neo4j-rs` reference example). [`InMemoryStore`](store::InMemoryStore)
//! implements `GraphStore` directly, without a backend, for tests and
//! offline operation.

mod backend;
mod neo4j;
mod pool;
mod record;
mod store;

pub use backend::GraphBackend;
pub use neo4j::Neo4jBackend;
pub use pool::ConnectionPool;
pub use record::{NodeRecord, RelationshipRecord};
pub use store::{GraphStore, InMemoryStore, Neo4jStore};

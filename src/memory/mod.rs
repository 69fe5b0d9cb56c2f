// Copyright 2025 Cowboy AI, LLC.

//! Associative Memory (§4.5): a retrieval layer over Memory nodes used by
//! agents to remember contexts. Built fresh — the teacher has no analogous
//! subsystem — but structured the way its repositories wrap a store handle,
//! with scoring split into its own pure-function module (`scoring.rs`) so
//! the weighted-sum formula is unit-testable without a graph in play.

mod record;
mod scoring;
mod store;

pub use record::{Memory, MemoryType};
pub use store::AssociativeMemory;

// Copyright 2025 Cowboy AI, LLC.

//! The Event Pipeline (§4.4).
//!
//! `EventsNode.Log` persists an Event node then enqueues it onto a bounded
//! `tokio::sync::mpsc` channel; [`processor::EventProcessor`] owns a fixed
//! pool of worker tasks draining that channel, running each event through
//! filters, then handlers, then correlation rules, in that order.
//! Grounded on the teacher's `EventHandler<E>` dispatch shape
//! (`event_handler.rs`), generalized from one compile-time event enum to a
//! runtime, glob-matched event-type registry, since this crate's domain
//! extensions add event types the core cannot enumerate at compile time.

mod correlation;
mod event;
mod glob;
mod processor;

pub use correlation::CorrelationRule;
pub use event::{Event, NodeReference};
pub use processor::{EventFilter, EventHandler, EventProcessor, ProcessorHandle};

// Copyright 2025 Cowboy AI, LLC.

//! Event-type glob matching.
//!
//! Event types are dotted strings (`agent.action`, `workflow.step.completed`).
//! A glob is the same shape with `*` standing for exactly one segment and a
//! trailing `**` standing for zero or more. No existing crate in the
//! teacher's or the pack's dependency stack does this narrow a thing, so
//! it's hand-rolled rather than pulling in a general globbing crate for one
//! dotted-segment matcher.

/// True if `event_type` matches `pattern`.
pub fn matches(pattern: &str, event_type: &str) -> bool {
    let pattern_segments: Vec<&str> = pattern.split('.').collect();
    let event_segments: Vec<&str> = event_type.split('.').collect();

    let mut p = 0;
    let mut e = 0;
    while p < pattern_segments.len() {
        if pattern_segments[p] == "**" {
            return true;
        }
        if e >= event_segments.len() {
            return false;
        }
        if pattern_segments[p] != "*" && pattern_segments[p] != event_segments[e] {
            return false;
        }
        p += 1;
        e += 1;
    }
    e == event_segments.len()
}

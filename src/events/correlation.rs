// Copyright 2025 Cowboy AI, LLC.

//! Correlation rules (§4.4 step 3): "when all named types have been
//! observed within any sliding window of size `W`, the rule's
//! emitted-event template is produced". Bookkeeping is in-memory per
//! process and is lost across restart, as specified.

use super::event::Event;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::{HashSet, VecDeque};
use uuid::Uuid;

/// A declared correlation: a set of event types to watch and the event to
/// emit once all have been seen within the window.
#[derive(Debug, Clone)]
pub struct CorrelationRule {
    /// Rule name, for diagnostics.
    pub name: String,
    /// Event types that must all occur within `window` to trigger.
    pub event_types: Vec<String>,
    /// The sliding window size.
    pub window: ChronoDuration,
    /// Metadata field whose value must match across every observed event
    /// for them to correlate (e.g. `"task_id"`, so `task.started` for task
    /// A never completes the set with `task.completed` for task B).
    /// `None` correlates on type and window alone.
    pub key_field: Option<String>,
    /// The `event_type` of the synthesized event fed back through `Log`.
    pub emit_type: String,
    /// Source recorded on the synthesized event.
    pub emit_source: String,
}

/// Per-rule sliding-window observation state.
#[derive(Debug, Default)]
pub struct CorrelationTracker {
    observations: VecDeque<Event>,
}

impl CorrelationTracker {
    /// Record `event` and, if this completes the rule's set within the
    /// window for `event`'s correlation key, return the synthesized event
    /// to feed back through `Log`. The synthesized event's `related`
    /// references every observed event that completed the set; other
    /// pending observations (other keys, or types not yet seen for this
    /// key) remain tracked.
    pub fn observe(&mut self, rule: &CorrelationRule, event: &Event, now: DateTime<Utc>) -> Option<Event> {
        if !rule.event_types.iter().any(|t| t == &event.event_type) {
            return None;
        }

        self.observations.push_back(event.clone());
        let cutoff = now - rule.window;
        while let Some(oldest) = self.observations.front() {
            if oldest.timestamp < cutoff {
                self.observations.pop_front();
            } else {
                break;
            }
        }

        let key = rule.key_field.as_deref().and_then(|field| correlation_key(event, field));
        let matching: Vec<&Event> = self
            .observations
            .iter()
            .filter(|seen| self.same_correlation_group(rule, seen, key.as_deref()))
            .collect();

        let all_seen = rule
            .event_types
            .iter()
            .all(|t| matching.iter().any(|seen| &seen.event_type == t));

        if !all_seen {
            return None;
        }

        let matched_ids: HashSet<Uuid> = matching.iter().map(|seen| seen.id).collect();
        let mut synthesized = Event::new(rule.emit_type.clone(), rule.emit_source.clone(), now)
            .with_metadata("correlation_rule", serde_json::json!(rule.name));
        let mut remaining = VecDeque::new();
        for observed in self.observations.drain(..) {
            if matched_ids.contains(&observed.id) {
                synthesized = synthesized.with_related("Event", observed.id.to_string());
            } else {
                remaining.push_back(observed);
            }
        }
        self.observations = remaining;
        Some(synthesized)
    }

    /// True if `candidate` belongs to the same correlation group as the
    /// event that just triggered `observe`. With no `key_field`, every
    /// observation of a declared type groups together, matching the
    /// type-and-window-only behavior. With a `key_field`, `candidate` must
    /// carry the same key value.
    fn same_correlation_group(&self, rule: &CorrelationRule, candidate: &Event, key: Option<&str>) -> bool {
        match (rule.key_field.as_deref(), key) {
            (Some(field), Some(key)) => correlation_key(candidate, field).as_deref() == Some(key),
            (Some(_), None) => false,
            (None, _) => true,
        }
    }
}

/// Read a correlation key out of an event's metadata as a comparable
/// string, whether it was stored as a JSON string or a bare number.
fn correlation_key(event: &Event, field: &str) -> Option<String> {
    event.metadata.get(field).map(|value| match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule() -> CorrelationRule {
        CorrelationRule {
            name: "deploy-ready".to_string(),
            event_types: vec!["build.done".to_string(), "tests.passed".to_string()],
            window: ChronoDuration::seconds(60),
            key_field: None,
            emit_type: "deploy.ready".to_string(),
            emit_source: "pipeline".to_string(),
        }
    }

    fn keyed_rule() -> CorrelationRule {
        CorrelationRule {
            name: "task-succeeded".to_string(),
            event_types: vec!["task.started".to_string(), "task.completed".to_string()],
            window: ChronoDuration::seconds(60),
            key_field: Some("task_id".to_string()),
            emit_type: "task.succeeded".to_string(),
            emit_source: "orchestrator".to_string(),
        }
    }

    #[test]
    fn fires_once_both_types_seen_within_window() {
        let rule = rule();
        let mut tracker = CorrelationTracker::default();
        let t0 = Utc::now();

        let e1 = Event::new("build.done", "ci", t0);
        assert!(tracker.observe(&rule, &e1, t0).is_none());

        let e2 = Event::new("tests.passed", "ci", t0 + ChronoDuration::seconds(10));
        let emitted = tracker
            .observe(&rule, &e2, t0 + ChronoDuration::seconds(10))
            .unwrap();
        assert_eq!(emitted.event_type, "deploy.ready");
        assert_eq!(emitted.related.len(), 2);
        let related_ids: Vec<&str> = emitted.related.iter().map(|r| r.id.as_str()).collect();
        assert!(related_ids.contains(&e1.id.to_string().as_str()));
        assert!(related_ids.contains(&e2.id.to_string().as_str()));
    }

    #[test]
    fn does_not_fire_outside_window() {
        let rule = rule();
        let mut tracker = CorrelationTracker::default();
        let t0 = Utc::now();

        let e1 = Event::new("build.done", "ci", t0);
        tracker.observe(&rule, &e1, t0);

        let e2 = Event::new(
            "tests.passed",
            "ci",
            t0 + ChronoDuration::seconds(120),
        );
        let emitted = tracker.observe(&rule, &e2, t0 + ChronoDuration::seconds(120));
        assert!(emitted.is_none());
    }

    #[test]
    fn unrelated_event_type_is_ignored() {
        let rule = rule();
        let mut tracker = CorrelationTracker::default();
        let t0 = Utc::now();
        let unrelated = Event::new("unrelated.thing", "ci", t0);
        assert!(tracker.observe(&rule, &unrelated, t0).is_none());
    }

    #[test]
    fn keyed_rule_does_not_fire_across_different_keys() {
        let rule = keyed_rule();
        let mut tracker = CorrelationTracker::default();
        let t0 = Utc::now();

        let started_a = Event::new("task.started", "worker", t0).with_metadata("task_id", serde_json::json!("a"));
        assert!(tracker.observe(&rule, &started_a, t0).is_none());

        let completed_b = Event::new("task.completed", "worker", t0 + ChronoDuration::seconds(1))
            .with_metadata("task_id", serde_json::json!("b"));
        let emitted = tracker.observe(&rule, &completed_b, t0 + ChronoDuration::seconds(1));
        assert!(emitted.is_none());
    }

    #[test]
    fn keyed_rule_fires_once_matching_key_seen_and_leaves_others_pending() {
        let rule = keyed_rule();
        let mut tracker = CorrelationTracker::default();
        let t0 = Utc::now();

        let started_a = Event::new("task.started", "worker", t0).with_metadata("task_id", serde_json::json!("a"));
        tracker.observe(&rule, &started_a, t0);

        let started_b = Event::new("task.started", "worker", t0).with_metadata("task_id", serde_json::json!("b"));
        assert!(tracker.observe(&rule, &started_b, t0).is_none());

        let completed_a = Event::new("task.completed", "worker", t0 + ChronoDuration::seconds(1))
            .with_metadata("task_id", serde_json::json!("a"));
        let emitted = tracker
            .observe(&rule, &completed_a, t0 + ChronoDuration::seconds(1))
            .unwrap();
        assert_eq!(emitted.event_type, "task.succeeded");
        assert_eq!(emitted.related.len(), 2);
        let related_ids: Vec<&str> = emitted.related.iter().map(|r| r.id.as_str()).collect();
        assert!(related_ids.contains(&started_a.id.to_string().as_str()));
        assert!(related_ids.contains(&completed_a.id.to_string().as_str()));

        // task b's start is still pending, untouched by task a's completion.
        let completed_b = Event::new("task.completed", "worker", t0 + ChronoDuration::seconds(2))
            .with_metadata("task_id", serde_json::json!("b"));
        let emitted_b = tracker
            .observe(&rule, &completed_b, t0 + ChronoDuration::seconds(2))
            .unwrap();
        assert_eq!(emitted_b.related.len(), 2);
    }
}

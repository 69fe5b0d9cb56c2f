// Copyright 2025 Cowboy AI, LLC.

//! Pure scoring functions for `RecallByContext` (§4.5), kept separate from
//! [`super::store::AssociativeMemory`] so the weighted-sum formula and its
//! edge cases are testable without a graph store in play.

use std::collections::HashMap;

/// Context match between a recall query and a memory's context map:
/// per query key, absent in the memory's context scores 0, an exact value
/// match scores 1, a partial (substring) match scores 0.5. Normalized by
/// the number of keys in the query.
pub fn context_match(query: &HashMap<String, String>, context: &HashMap<String, String>) -> f32 {
    if query.is_empty() {
        return 0.0;
    }
    let total: f32 = query
        .iter()
        .map(|(key, want)| match context.get(key) {
            None => 0.0,
            Some(have) if have == want => 1.0,
            Some(have) if have.contains(want.as_str()) || want.contains(have.as_str()) => 0.5,
            Some(_) => 0.0,
        })
        .sum();
    total / query.len() as f32
}

/// The weighted recall score: `α·contextMatch + β·importance_now +
/// γ·semanticSim`.
pub fn recall_score(
    context_match: f32,
    importance_now: f32,
    semantic_sim: f32,
    alpha: f32,
    beta: f32,
    gamma: f32,
) -> f32 {
    alpha * context_match + beta * importance_now + gamma * semantic_sim
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn exact_match_scores_one_per_key() {
        let query = map(&[("topic", "rust")]);
        let context = map(&[("topic", "rust")]);
        assert_eq!(context_match(&query, &context), 1.0);
    }

    #[test]
    fn absent_key_scores_zero() {
        let query = map(&[("topic", "rust")]);
        let context = map(&[("other", "value")]);
        assert_eq!(context_match(&query, &context), 0.0);
    }

    #[test]
    fn partial_containment_scores_half() {
        let query = map(&[("topic", "rust")]);
        let context = map(&[("topic", "rust-lang")]);
        assert_eq!(context_match(&query, &context), 0.5);
    }

    #[test]
    fn score_is_normalized_by_query_key_count() {
        let query = map(&[("a", "1"), ("b", "2")]);
        let context = map(&[("a", "1")]);
        assert_eq!(context_match(&query, &context), 0.5);
    }

    #[test]
    fn empty_query_scores_zero() {
        assert_eq!(context_match(&HashMap::new(), &HashMap::new()), 0.0);
    }

    #[test]
    fn recall_score_is_weighted_sum() {
        let score = recall_score(1.0, 0.5, 0.0, 0.5, 0.3, 0.2);
        assert!((score - 0.65).abs() < 1e-6);
    }
}

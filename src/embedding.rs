// Copyright 2025 Cowboy AI, LLC.

//! The embedding-provider collaborator.
//!
//! §6 lists `embed(text) -> vector<float,D>` as consumed from an external
//! collaborator and §9 notes the provider belongs to a future phase; the
//! core treats it as optional. When `embedding.provider = none` (the
//! default), [`NoopEmbeddingProvider`] makes `semanticSim` contribute zero
//! everywhere, exactly as §4.5 specifies for memories without an embedding.

use async_trait::async_trait;
use crate::errors::DomainResult;

/// Computes a fixed-width embedding vector from text.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Dimensionality of vectors this provider returns.
    fn dimensions(&self) -> usize;

    /// Embed `text` into a vector of [`Self::dimensions`] floats.
    async fn embed(&self, text: &str) -> DomainResult<Vec<f32>>;
}

/// The default provider: no embeddings are computed, so semantic similarity
/// never contributes to recall scoring.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEmbeddingProvider;

#[async_trait]
impl EmbeddingProvider for NoopEmbeddingProvider {
    fn dimensions(&self) -> usize {
        0
    }

    async fn embed(&self, _text: &str) -> DomainResult<Vec<f32>> {
        Ok(Vec::new())
    }
}

/// Cosine similarity between two equal-length vectors, rescaled from
/// `[-1, 1]` to `[0, 1]` per §4.5. Returns `0.0` when either vector is empty
/// (no embedding available on that side).
pub fn cosine_similarity_rescaled(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let cosine = (dot / (norm_a * norm_b)).clamp(-1.0, 1.0);
    (cosine + 1.0) / 2.0
}

//! Semantic representations used to compare element text with the query.

pub mod hashing;
pub mod ollama;

pub use hashing::HashingEngine;
pub use ollama::OllamaEmbedding;

use crate::error::{Result, ScrapeError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Vector representation of a piece of text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Embedding {
    /// Vector representation.
    pub vector: Vec<f32>,
}

impl Embedding {
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector }
    }

    pub fn dimension(&self) -> usize {
        self.vector.len()
    }

    /// Compute cosine similarity with another embedding.
    ///
    /// Mismatched dimensions and zero vectors compare as 0.0.
    pub fn cosine_similarity(&self, other: &Self) -> f64 {
        if self.dimension() != other.dimension() {
            return 0.0;
        }

        let dot: f64 = self
            .vector
            .iter()
            .zip(other.vector.iter())
            .map(|(a, b)| f64::from(*a) * f64::from(*b))
            .sum();

        let norm_a = self.norm();
        let norm_b = other.norm();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot / (norm_a * norm_b)
    }

    fn norm(&self) -> f64 {
        self.vector
            .iter()
            .map(|x| f64::from(*x) * f64::from(*x))
            .sum::<f64>()
            .sqrt()
    }
}

/// Engine turning text into comparable embeddings.
///
/// The matcher hands every distinct node text to [`SemanticEngine::embed_batch`]
/// in one call, so remote engines can batch their requests.
#[async_trait]
pub trait SemanticEngine: Send + Sync {
    /// Embed several texts; the result holds one embedding per input, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>>;

    /// Embed a single piece of text.
    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ScrapeError::Embedding("engine returned no embedding".to_string()))
    }

    /// Similarity between two embeddings, in [-1, 1] for the default cosine measure.
    fn similarity(&self, a: &Embedding, b: &Embedding) -> f64 {
        a.cosine_similarity(b)
    }
}

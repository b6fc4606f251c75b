//! Bag-of-words feature hashing embedding.

use crate::error::{Result, ScrapeError};
use crate::semantic::{Embedding, SemanticEngine};
use async_trait::async_trait;
use sha2::{Digest, Sha256};

pub const DEFAULT_DIMENSIONS: usize = 512;

/// Engine hashing lower-cased word tokens into a fixed-size vector.
///
/// Texts sharing vocabulary point in similar directions; texts with no shared
/// words are (up to hash collisions) orthogonal. Identical texts always have
/// cosine similarity 1.0 unless they contain no words at all. Tokens are hashed
/// with SHA-256, so a given text maps to the same vector on every platform and
/// toolchain.
///
/// This is lexical overlap, not meaning: it needs no model server and suits
/// tests and offline runs.
#[derive(Debug, Clone)]
pub struct HashingEngine {
    dimensions: usize,
}

impl HashingEngine {
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(ScrapeError::Config(
                "embedding dimensions must be greater than zero".to_string(),
            ));
        }
        Ok(Self { dimensions })
    }

    fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
            .map(str::to_lowercase)
    }

    fn token_hash(token: &str) -> u64 {
        let digest = Sha256::digest(token.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(bytes)
    }

    fn hash_text(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0f32; self.dimensions];

        for token in Self::tokens(text) {
            let hash = Self::token_hash(&token);
            let slot = (hash % self.dimensions as u64) as usize;
            // Top bit picks the sign so colliding tokens tend to cancel out
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[slot] += sign;
        }

        Embedding::new(vector)
    }
}

impl Default for HashingEngine {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
        }
    }
}

#[async_trait]
impl SemanticEngine for HashingEngine {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|text| self.hash_text(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(matches!(HashingEngine::new(0), Err(ScrapeError::Config(_))));
    }

    #[tokio::test]
    async fn test_identical_texts_are_maximally_similar() {
        let engine = HashingEngine::default();
        let a = engine.embed("Product listing: widgets").await.unwrap();
        let b = engine.embed("product LISTING widgets").await.unwrap();
        assert!((engine.similarity(&a, &b) - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_shared_words_beat_unrelated_words() {
        let engine = HashingEngine::default();
        let query = engine.embed("cheap blue widget").await.unwrap();
        let related = engine.embed("Blue widget, $10").await.unwrap();
        let unrelated = engine.embed("Contact us about careers").await.unwrap();

        assert!(engine.similarity(&query, &related) > engine.similarity(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_empty_text_embeds_to_zero_vector() {
        let engine = HashingEngine::new(16).unwrap();
        let empty = engine.embed("  \n ").await.unwrap();
        assert_eq!(empty.dimension(), 16);
        assert!(empty.vector.iter().all(|v| *v == 0.0));

        let query = engine.embed("anything").await.unwrap();
        assert_eq!(engine.similarity(&empty, &query), 0.0);
    }

    #[tokio::test]
    async fn test_batch_matches_single_embeddings() {
        let engine = HashingEngine::default();
        let batch = engine.embed_batch(&["alpha", "beta"]).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], engine.embed("alpha").await.unwrap());
        assert_eq!(batch[1], engine.embed("beta").await.unwrap());
    }

    #[test]
    fn test_token_hash_is_fixed() {
        // SHA-256("abc") starts with ba 78 16 bf 8f 01 cf ea
        assert_eq!(HashingEngine::token_hash("abc"), 0xeacf_018f_bf16_78ba);
    }
}

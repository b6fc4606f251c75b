//! Embeddings from a model served through an Ollama-compatible `/api/embed` endpoint.

use crate::error::{Result, ScrapeError};
use crate::semantic::{Embedding, SemanticEngine};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// Texts sent per request
pub const DEFAULT_BATCH_SIZE: usize = 64;

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Semantic engine backed by an embedding model on an Ollama server
pub struct OllamaEmbedding {
    client: reqwest::Client,
    endpoint: String,
    model_name: String,
    batch_size: usize,
}

impl OllamaEmbedding {
    pub fn new(base_url: impl Into<String>, model_name: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| ScrapeError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/embed", base_url.into().trim_end_matches('/')),
            model_name: model_name.into(),
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Builder method: set how many texts go into one request
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    async fn embed_chunk(&self, chunk: &[&str]) -> Result<Vec<Embedding>> {
        let request = EmbedRequest {
            model: &self.model_name,
            input: chunk,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ScrapeError::Embedding(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ScrapeError::Embedding(format!("HTTP {}: {}", status, body)));
        }

        let reply: EmbedResponse = response
            .json()
            .await
            .map_err(|e| ScrapeError::Embedding(format!("Failed to decode embed response: {}", e)))?;

        if reply.embeddings.len() != chunk.len() {
            return Err(ScrapeError::Embedding(format!(
                "expected {} embeddings, got {}",
                chunk.len(),
                reply.embeddings.len()
            )));
        }

        Ok(reply.embeddings.into_iter().map(Embedding::new).collect())
    }
}

#[async_trait]
impl SemanticEngine for OllamaEmbedding {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(self.batch_size) {
            embeddings.extend(self.embed_chunk(chunk).await?);
        }

        log::debug!("Embedded {} texts with {}", embeddings.len(), self.model_name);
        Ok(embeddings)
    }
}

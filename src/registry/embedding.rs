//! Embedding collaborator
//!
//! Prompts and assistant messages get an optional vector from an
//! OpenAI-compatible embeddings endpoint (OpenRouter by default). Any failure
//! is masked as `None`; the record is stored either way.

use crate::config::EmbeddingConfig;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Shared HTTP client for embedding requests to enable connection pooling
static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(5)
        .build()
        .expect("Failed to create HTTP client")
});

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Vector for `text`, or `None` when unavailable
    async fn embed(&self, text: &str) -> Option<Vec<f32>>;

    /// Whether `embed` can ever return a vector
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Used when no API key is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledEmbeddings;

#[async_trait]
impl EmbeddingProvider for DisabledEmbeddings {
    async fn embed(&self, _text: &str) -> Option<Vec<f32>> {
        tracing::debug!("Embeddings disabled - skipping generation");
        None
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// OpenAI-compatible `/embeddings` client
#[derive(Debug, Clone)]
pub struct OpenRouterEmbeddings {
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

impl OpenRouterEmbeddings {
    pub fn new(api_key: &str, base_url: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    async fn request(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let response = HTTP_CLIENT
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({ "input": text, "model": self.model }))
            .send()
            .await?
            .error_for_status()?;

        let body: EmbeddingResponse = response.json().await?;
        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| anyhow::anyhow!("Embedding response contained no data"))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenRouterEmbeddings {
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        if text.trim().is_empty() {
            tracing::warn!("Empty text provided for embedding");
            return None;
        }

        match self.request(text).await {
            Ok(embedding) => {
                tracing::debug!(
                    "Generated embedding for text ({} chars) -> {} dimensions",
                    text.len(),
                    embedding.len()
                );
                Some(embedding)
            }
            Err(e) => {
                tracing::error!("Failed to generate embedding: {}", e);
                None
            }
        }
    }
}

/// Pick a provider from config: disabled unless an API key is present
pub fn provider_from_config(config: &EmbeddingConfig) -> Arc<dyn EmbeddingProvider> {
    match config.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
        Some(key) => {
            tracing::info!("Embedding service initialized with model: {}", config.model);
            Arc::new(OpenRouterEmbeddings::new(key, &config.base_url, &config.model))
        }
        None => {
            tracing::warn!("Embedding API key not configured - embeddings disabled");
            Arc::new(DisabledEmbeddings)
        }
    }
}

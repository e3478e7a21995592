use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use extract::{RetryPolicy, is_transient};

use crate::cache::EmbeddingCache;

#[derive(Clone)]
pub struct EmbeddingClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
    retry: RetryPolicy,
    cache: Option<EmbeddingCache>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

impl EmbeddingClient {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url,
            model,
            client: reqwest::Client::new(),
            retry: RetryPolicy::default(),
            cache: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(self)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cache(mut self, cache: EmbeddingCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Generate embedding for text
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(hit) = self.cache.as_ref().and_then(|c| c.get(text)) {
            tracing::debug!(model = %self.model, "Embedding cache hit");
            return Ok(hit);
        }

        let embedding = self
            .retry
            .retry_if("ollama.embed", move || self.request(text), is_transient)
            .await?;

        if let Some(cache) = &self.cache {
            cache.insert(text, embedding.clone());
        }
        Ok(embedding)
    }

    /// Get embedding dimension
    pub async fn get_dimension(&self) -> Result<usize> {
        let test_embedding = self.embed("test").await?;
        Ok(test_embedding.len())
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);

        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send embedding request")?
            .error_for_status()
            .context("Embedding request failed")?;

        let embedding_response: EmbeddingResponse = response
            .json()
            .await
            .context("Failed to parse embedding response")?;

        if embedding_response.embedding.is_empty() {
            anyhow::bail!("Embedding model returned an empty vector");
        }

        Ok(embedding_response.embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cached_text_skips_the_network() {
        let cache = EmbeddingCache::new(4);
        cache.insert("knee surgery", vec![0.5, 0.5]);

        // Nothing listens here; only a cache hit can succeed.
        let client = EmbeddingClient::new("http://127.0.0.1:9".to_string(), "test".to_string())
            .with_retry(RetryPolicy::none())
            .with_cache(cache);

        assert_eq!(client.embed("knee surgery").await.unwrap(), vec![0.5, 0.5]);
        assert!(client.embed("hip replacement").await.is_err());
    }
}

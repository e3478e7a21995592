use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use claims::CollaboratorError;

use crate::normalizer::strip_code_fence;
use crate::prompt::build_retry_prompt;
use crate::retry::{RetryPolicy, is_transient};

#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

/// The model kept answering with text that does not parse as JSON.
#[derive(Debug, thiserror::Error)]
#[error("model returned invalid JSON after {retries} correction attempts")]
pub struct InvalidJson {
    pub retries: usize,
}

/// Map a client failure onto the collaborator taxonomy: unparsable model
/// output is malformed, anything else means the model was unreachable.
pub fn collaborator_error(err: anyhow::Error) -> CollaboratorError {
    if err.downcast_ref::<InvalidJson>().is_some() {
        CollaboratorError::Malformed(format!("{:#}", err))
    } else {
        CollaboratorError::Unavailable(format!("{:#}", err))
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>, // "json" for structured output
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url,
            model,
            client: reqwest::Client::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// Bound every request by `timeout`.
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

    /// Free-text completion.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        self.retry
            .retry_if("ollama.generate", move || self.send(prompt, None), is_transient)
            .await
    }

    /// Completion constrained to JSON output, with code fences removed.
    pub async fn generate_json(&self, prompt: &str) -> Result<String> {
        let reply = self
            .retry
            .retry_if("ollama.generate_json", move || self.send(prompt, Some("json")), is_transient)
            .await?;
        Ok(strip_code_fence(&reply).to_string())
    }

    /// Generate with retry for invalid JSON
    pub async fn generate_json_with_retry(
        &self,
        prompt: &str,
        max_retries: usize,
    ) -> Result<String> {
        let mut response = self.generate_json(prompt).await?;

        for _ in 0..max_retries {
            if serde_json::from_str::<serde_json::Value>(&response).is_ok() {
                return Ok(response);
            }
            tracing::debug!(model = %self.model, "Invalid JSON from model, asking for a correction");
            response = self.generate_json(&build_retry_prompt(&response)).await?;
        }

        if serde_json::from_str::<serde_json::Value>(&response).is_ok() {
            return Ok(response);
        }
        Err(InvalidJson { retries: max_retries }.into())
    }

    async fn send(&self, prompt: &str, format: Option<&str>) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            format,
        };

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Ollama")?
            .error_for_status()
            .context("Ollama request failed")?;

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        Ok(ollama_response.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_json_is_malformed() {
        let err = anyhow::Error::from(InvalidJson { retries: 2 }).context("Failed to structure query");
        match collaborator_error(err) {
            CollaboratorError::Malformed(msg) => assert!(msg.contains("invalid JSON after 2")),
            other => panic!("expected malformed, got {other:?}"),
        }
    }

    #[test]
    fn test_transport_failure_is_unavailable() {
        let err = anyhow::anyhow!("connection refused").context("Failed to send request to Ollama");
        assert!(matches!(collaborator_error(err), CollaboratorError::Unavailable(_)));
    }
}

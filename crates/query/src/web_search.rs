use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use claims::{CollaboratorError, CollaboratorResult, WebResult, WebSearch};

const SERPAPI_URL: &str = "https://serpapi.com/search.json";

/// Google results through SerpAPI.
pub struct SerpApiSearch {
    api_key: Option<String>,
    base_url: String,
    num_results: usize,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
}

#[derive(Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    link: String,
}

impl SerpApiSearch {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: SERPAPI_URL.to_string(),
            num_results: 5,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(self)
    }

    async fn fetch(&self, api_key: &str, search_query: &str) -> Result<Vec<WebResult>> {
        let num = self.num_results.to_string();
        let response = self.client
            .get(&self.base_url)
            .query(&[
                ("engine", "google"),
                ("q", search_query),
                ("num", num.as_str()),
                ("api_key", api_key),
            ])
            .send()
            .await
            .context("Failed to send request to SerpAPI")?;

        if !response.status().is_success() {
            anyhow::bail!("SerpAPI request failed: {}", response.status());
        }

        let body: serde_json::Value = response.json().await.context("Failed to parse SerpAPI response")?;
        Ok(parse_organic_results(body, self.num_results))
    }
}

pub fn build_search_query(query_text: &str, location: &str) -> String {
    format!("{} insurance policy coverage {}", query_text.trim(), location.trim())
        .trim()
        .to_string()
}

/// Map a SerpAPI body into at most `limit` results; entries without a title or snippet are skipped.
pub fn parse_organic_results(body: serde_json::Value, limit: usize) -> Vec<WebResult> {
    let response: SearchResponse = match serde_json::from_value(body) {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, "Unexpected SerpAPI response shape");
            return Vec::new();
        }
    };

    response
        .organic_results
        .into_iter()
        .filter(|r| !r.title.trim().is_empty() || !r.snippet.trim().is_empty())
        .take(limit)
        .map(|r| WebResult::new(r.title, r.snippet, r.link))
        .collect()
}

#[async_trait]
impl WebSearch for SerpApiSearch {
    async fn search(&self, query_text: &str, location: &str) -> CollaboratorResult<Vec<WebResult>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| CollaboratorError::Unavailable("SerpAPI key is not configured".to_string()))?;

        let search_query = build_search_query(query_text, location);
        let results = self.fetch(api_key, &search_query).await?;
        tracing::debug!(query = %search_query, results = results.len(), "Web search");
        Ok(results)
    }
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;

use claims::{
    CollaboratorError, CollaboratorResult, EvidenceChunk, EvidenceRetriever, FinalResponse,
    ResponseSink,
};

use crate::embeddings::EmbeddingClient;

/// A single Qdrant collection reached over the REST API.
#[derive(Clone)]
pub struct QdrantCollection {
    base_url: String,
    client: reqwest::Client,
    embedding_client: EmbeddingClient,
    collection_name: String,
}

#[derive(Serialize)]
struct CreateCollection {
    vectors: VectorParams,
}

#[derive(Serialize)]
struct VectorParams {
    size: usize,
    distance: String,
}

#[derive(Serialize)]
struct UpsertPoints {
    points: Vec<Point>,
}

#[derive(Serialize)]
struct Point {
    id: String,
    vector: Vec<f32>,
    payload: HashMap<String, Value>,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
}

#[derive(Deserialize)]
struct CollectionInfo {
    result: CollectionResult,
}

#[derive(Deserialize)]
struct CollectionResult {
    collections: Vec<Collection>,
}

#[derive(Deserialize)]
struct Collection {
    name: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    score: f32,
    #[serde(default)]
    payload: Option<HashMap<String, Value>>,
}

impl QdrantCollection {
    pub fn new(
        base_url: String,
        embedding_client: EmbeddingClient,
        collection_name: String,
    ) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
            embedding_client,
            collection_name,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.collection_name
    }

    /// Create the collection if it does not exist yet
    pub async fn init_collection(&self) -> Result<()> {
        let url = format!("{}/collections", self.base_url);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to list collections: {}", response.status());
        }

        let info: CollectionInfo = response.json().await?;
        let exists = info.result.collections.iter()
            .any(|c| c.name == self.collection_name);

        if exists {
            tracing::debug!(collection = %self.collection_name, "Collection already exists");
            return Ok(());
        }

        let dimension = self.embedding_client.get_dimension().await?;
        tracing::info!(collection = %self.collection_name, dimension, "Creating collection");

        let url = format!("{}/collections/{}", self.base_url, self.collection_name);
        let create_req = CreateCollection {
            vectors: VectorParams {
                size: dimension,
                distance: "Cosine".to_string(),
            },
        };

        let response = self.client
            .put(&url)
            .json(&create_req)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            anyhow::bail!("Failed to create collection: {}", error_text);
        }

        Ok(())
    }

    /// Embed `text` and return the `k` nearest chunks, best first
    pub async fn search(&self, text: &str, k: usize) -> Result<Vec<EvidenceChunk>> {
        let embedding = self.embedding_client
            .embed(text)
            .await
            .context("Failed to generate query embedding")?;

        let url = format!(
            "{}/collections/{}/points/search",
            self.base_url, self.collection_name
        );
        let request = SearchRequest {
            vector: &embedding,
            limit: k,
            with_payload: true,
        };

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send search request to Qdrant")?;

        if !response.status().is_success() {
            anyhow::bail!("Qdrant search failed: {}", response.status());
        }

        let body: Value = response.json().await.context("Failed to parse Qdrant response")?;
        parse_search_response(body)
    }

    /// Embed each `(text, payload)` pair and upsert them as new points
    pub async fn upsert(&self, items: Vec<(String, HashMap<String, Value>)>) -> Result<usize> {
        let mut points = Vec::with_capacity(items.len());
        for (text, payload) in items {
            let vector = self.embedding_client
                .embed(&text)
                .await
                .context("Failed to generate embedding")?;
            points.push(Point {
                id: uuid::Uuid::new_v4().to_string(),
                vector,
                payload,
            });
        }
        let count = points.len();

        let url = format!(
            "{}/collections/{}/points",
            self.base_url, self.collection_name
        );
        let response = self.client
            .put(&url)
            .json(&UpsertPoints { points })
            .send()
            .await
            .context("Failed to send upsert request to Qdrant")?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            anyhow::bail!("Failed to upsert points: {}", error_text);
        }

        Ok(count)
    }
}

/// Map a Qdrant search body into ranked chunks. Points without text are dropped.
pub fn parse_search_response(body: Value) -> Result<Vec<EvidenceChunk>> {
    let response: SearchResponse =
        serde_json::from_value(body).context("Unexpected Qdrant search response shape")?;

    let mut chunks: Vec<EvidenceChunk> = response
        .result
        .into_iter()
        .filter_map(|point| {
            let payload = point.payload?;
            let text = payload.get("text").and_then(Value::as_str)?.trim().to_string();
            if text.is_empty() {
                return None;
            }
            let mut chunk = EvidenceChunk::new(text, point.score);
            chunk.coverage_limit = payload.get("coverage_limit").and_then(limit_value);
            Some(chunk)
        })
        .collect();

    EvidenceChunk::rank(&mut chunks);
    Ok(chunks)
}

fn limit_value(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.replace(',', "").trim().parse().ok()?,
        _ => return None,
    };
    (n.is_finite() && n > 0.0).then_some(n)
}

/// Evidence retriever over the policy-document collection.
pub struct QdrantRetriever {
    collection: QdrantCollection,
}

impl QdrantRetriever {
    pub fn new(collection: QdrantCollection) -> Self {
        Self { collection }
    }
}

#[async_trait]
impl EvidenceRetriever for QdrantRetriever {
    async fn retrieve(&self, query_text: &str, k: usize) -> CollaboratorResult<Vec<EvidenceChunk>> {
        if query_text.trim().is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let chunks = self.collection.search(query_text, k).await?;
        tracing::debug!(
            collection = %self.collection.name(),
            k,
            returned = chunks.len(),
            "Retrieved policy chunks"
        );
        Ok(chunks)
    }
}

/// Stores each response twice: once under the query embedding and once
/// under the explanation embedding.
pub struct QdrantResponseStore {
    collection: QdrantCollection,
}

impl QdrantResponseStore {
    pub fn new(collection: QdrantCollection) -> Self {
        Self { collection }
    }
}

#[async_trait]
impl ResponseSink for QdrantResponseStore {
    async fn persist(&self, response: &FinalResponse) -> CollaboratorResult<()> {
        let payload = response_payload(response)?;

        let mut items = vec![(response.query.clone(), payload.clone())];
        if !response.explanation.trim().is_empty() {
            items.push((response.explanation.clone(), payload));
        }

        let stored = self.collection.upsert(items).await?;
        tracing::debug!(collection = %self.collection.name(), stored, "Persisted response");
        Ok(())
    }
}

pub(crate) fn response_payload(response: &FinalResponse) -> CollaboratorResult<HashMap<String, Value>> {
    let document = serde_json::to_value(response)
        .map_err(|e| CollaboratorError::Malformed(format!("response is not serializable: {}", e)))?;

    let mut payload = HashMap::new();
    payload.insert("query".to_string(), json!(response.query));
    payload.insert("decision".to_string(), json!(response.decision.as_str()));
    payload.insert("amount".to_string(), json!(response.amount));
    payload.insert("response".to_string(), document);
    payload.insert("timestamp".to_string(), json!(chrono::Utc::now().to_rfc3339()));
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::{Decision, FinalDecision, ParsedQuery};

    #[test]
    fn test_parse_search_response_ranks_and_filters() {
        let body = json!({
            "status": "ok",
            "result": [
                {"id": 1, "score": 0.62, "payload": {"text": "Knee surgery is covered after 90 days."}},
                {"id": 2, "score": 0.91, "payload": {"text": "Hospitalization limit", "coverage_limit": "7,00,000"}},
                {"id": 3, "score": 0.99, "payload": {"text": "   "}},
                {"id": 4, "score": 0.80}
            ]
        });

        let chunks = parse_search_response(body).unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "Hospitalization limit");
        assert_eq!(chunks[0].coverage_limit, Some(700_000.0));
        assert_eq!(chunks[1].coverage_limit, None);
    }

    #[test]
    fn test_empty_result_is_not_an_error() {
        let chunks = parse_search_response(json!({"result": []})).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_response_payload_carries_timestamp() {
        let decision = FinalDecision::rejected("retrieval failed");
        let response = FinalResponse::new("query".to_string(), ParsedQuery::default(), &decision, "text".to_string());

        let payload = response_payload(&response).unwrap();

        assert_eq!(payload["decision"], json!(Decision::Rejected.as_str()));
        let stamp = payload["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
    }
}

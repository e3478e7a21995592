pub mod heuristic;
pub mod llm;
pub mod normalizer;
pub mod prompt;
pub mod retry;

pub use heuristic::HeuristicStructurer;
pub use llm::{InvalidJson, OllamaClient, collaborator_error};
pub use normalizer::{FieldNormalizer, clean_text, strip_code_fence};
pub use retry::{RetryPolicy, is_transient};

use async_trait::async_trait;

use claims::{CollaboratorError, CollaboratorResult, ParsedQuery, QueryStructurer};

/// Turns a free-text claim query into a `ParsedQuery` using the local model.
pub struct QueryExtractor {
    llm_client: OllamaClient,
    normalizer: FieldNormalizer,
}

impl QueryExtractor {
    pub fn new(llm_client: OllamaClient) -> Self {
        Self {
            llm_client,
            normalizer: FieldNormalizer::new(),
        }
    }

}

#[async_trait]
impl QueryStructurer for QueryExtractor {
    async fn structure(&self, raw_text: &str) -> CollaboratorResult<ParsedQuery> {
        if raw_text.trim().is_empty() {
            return Err(CollaboratorError::Malformed("raw query is empty".to_string()));
        }

        let prompt = prompt::build_structuring_prompt(raw_text);
        let json_str = self
            .llm_client
            .generate_json_with_retry(&prompt, 2)
            .await
            .map_err(collaborator_error)?;

        let value: serde_json::Value = serde_json::from_str(&json_str)
            .map_err(|e| CollaboratorError::Malformed(e.to_string()))?;

        self.normalizer
            .parsed_from_value(&value)
            .map_err(CollaboratorError::Malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_query_never_reaches_the_model() {
        // Nothing listens on this port; an empty query must fail before any request.
        let extractor = QueryExtractor::new(
            OllamaClient::new("http://127.0.0.1:9".to_string(), "llama3".to_string())
                .with_retry(RetryPolicy::none()),
        );

        let result = extractor.structure("").await;
        assert!(matches!(result, Err(CollaboratorError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_unreachable_model_is_unavailable() {
        let extractor = QueryExtractor::new(
            OllamaClient::new("http://127.0.0.1:9".to_string(), "llama3".to_string())
                .with_retry(RetryPolicy::none()),
        );

        let result = extractor.structure("46M, knee surgery in Pune").await;
        assert!(matches!(result, Err(CollaboratorError::Unavailable(_))));
    }
}

//! Contracts for the external services the workflow talks to.
//!
//! Every call returns a `CollaboratorResult`; the workflow turns an `Err`
//! into the stage's fallback value, so implementations are free to use `?`.

use async_trait::async_trait;

use crate::error::CollaboratorResult;
use crate::schema::{EvidenceChunk, ParsedQuery, WebResult};
use crate::verdict::{ClaimVerdict, FinalDecision, FinalResponse};

#[async_trait]
pub trait QueryStructurer: Send + Sync {
    async fn structure(&self, raw_text: &str) -> CollaboratorResult<ParsedQuery>;
}

#[async_trait]
pub trait EvidenceRetriever: Send + Sync {
    /// Top `k` chunks ordered by descending score.
    async fn retrieve(&self, query_text: &str, k: usize) -> CollaboratorResult<Vec<EvidenceChunk>>;
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query_text: &str, location: &str) -> CollaboratorResult<Vec<WebResult>>;
}

/// Inputs of one evidence-based judgment.
#[derive(Debug, Clone, Copy)]
pub struct JudgmentRequest<'a> {
    pub parsed: &'a ParsedQuery,
    pub chunks: &'a [EvidenceChunk],
    pub web_results: &'a [WebResult],
    pub prior: Option<&'a ClaimVerdict>,
}

#[async_trait]
pub trait EvidenceJudge: Send + Sync {
    async fn judge(&self, request: JudgmentRequest<'_>) -> CollaboratorResult<ClaimVerdict>;
}

#[async_trait]
pub trait Explainer: Send + Sync {
    async fn explain(&self, parsed: &ParsedQuery, decision: &FinalDecision) -> CollaboratorResult<String>;
}

#[async_trait]
pub trait ResponseSink: Send + Sync {
    async fn persist(&self, response: &FinalResponse) -> CollaboratorResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    pub text: String,
    pub language: String,
}

impl NormalizedText {
    pub const DEFAULT_LANGUAGE: &'static str = "en";

    pub fn unchanged(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: Self::DEFAULT_LANGUAGE.to_string(),
        }
    }

    pub fn is_default_language(&self) -> bool {
        self.language == Self::DEFAULT_LANGUAGE
    }
}

#[async_trait]
pub trait LanguageNormalizer: Send + Sync {
    /// Detect the query language and translate it to English.
    async fn normalize(&self, raw_text: &str) -> CollaboratorResult<NormalizedText>;

    /// Translate an English text back into `language`.
    async fn localize(&self, text: &str, language: &str) -> CollaboratorResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollaboratorError;
    use std::sync::Arc;

    struct Unreachable;

    #[async_trait]
    impl QueryStructurer for Unreachable {
        async fn structure(&self, _raw_text: &str) -> CollaboratorResult<ParsedQuery> {
            Err(CollaboratorError::Unavailable("no reasoning service".to_string()))
        }
    }

    #[tokio::test]
    async fn structurer_is_usable_as_trait_object() {
        let structurer: Arc<dyn QueryStructurer> = Arc::new(Unreachable);
        let err = structurer.structure("46M, knee surgery").await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Unavailable(_)));
    }

    #[test]
    fn unchanged_text_uses_default_language() {
        let normalized = NormalizedText::unchanged("knee surgery");
        assert!(normalized.is_default_language());
    }
}

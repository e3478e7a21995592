use async_trait::async_trait;

use claims::{
    ClaimVerdict, CollaboratorError, CollaboratorResult, EvidenceChunk, EvidenceJudge, EvidenceRetriever,
    FinalResponse, JudgmentRequest, ResponseSink, WebResult, WebSearch,
};

/// Stand-in for every network collaborator when running without services.
/// Retrieval and search find nothing, judgment is unavailable, and
/// persistence is a no-op, so the rules engine decides.
#[derive(Debug, Default, Clone, Copy)]
pub struct Offline;

#[async_trait]
impl EvidenceRetriever for Offline {
    async fn retrieve(&self, _query_text: &str, _k: usize) -> CollaboratorResult<Vec<EvidenceChunk>> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl WebSearch for Offline {
    async fn search(&self, _query_text: &str, _location: &str) -> CollaboratorResult<Vec<WebResult>> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl EvidenceJudge for Offline {
    async fn judge(&self, _request: JudgmentRequest<'_>) -> CollaboratorResult<ClaimVerdict> {
        Err(CollaboratorError::Unavailable("offline mode".to_string()))
    }
}

#[async_trait]
impl ResponseSink for Offline {
    async fn persist(&self, _response: &FinalResponse) -> CollaboratorResult<()> {
        Ok(())
    }
}

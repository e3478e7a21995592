pub mod schema;
pub mod verdict;
pub mod collaborators;
pub mod error;
pub mod trace;

pub use schema::{ClauseSource, Clause, EvidenceChunk, Gender, ParsedQuery, WebResult};
pub use verdict::{ClaimVerdict, Decision, FinalDecision, FinalResponse, RuleDetails};
pub use collaborators::{
    EvidenceJudge, EvidenceRetriever, Explainer, JudgmentRequest, LanguageNormalizer,
    NormalizedText, QueryStructurer, ResponseSink, WebSearch,
};
pub use error::{CollaboratorError, CollaboratorResult, Stage};
pub use trace::{StageRecord, WorkflowTrace};

/// Clamp an externally supplied amount into the non-negative range.
/// NaN and infinities are treated as absent.
pub fn sanitize_amount(value: f64) -> Option<f64> {
    if value.is_finite() {
        Some(value.max(0.0))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_amount_clamps_negatives() {
        assert_eq!(sanitize_amount(-10.0), Some(0.0));
        assert_eq!(sanitize_amount(2500.0), Some(2500.0));
        assert_eq!(sanitize_amount(f64::NAN), None);
    }
}

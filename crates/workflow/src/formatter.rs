use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use claims::{
    ClaimVerdict, CollaboratorError, CollaboratorResult, Explainer, FinalDecision, ParsedQuery, Stage,
};
use rules::RulesEngine;

pub const MISSING_INFORMATION: &str =
    "We couldn't process your claim due to missing information. Please contact support.";

/// Result of formatting; `error` names the failure when the fallback text was used.
#[derive(Debug, Clone, PartialEq)]
pub struct Formatted {
    pub text: String,
    pub error: Option<String>,
}

/// Turns a final decision into a short customer-facing summary.
pub struct ExplanationFormatter {
    explainer: Arc<dyn Explainer>,
    timeout: Duration,
}

impl ExplanationFormatter {
    pub fn new(explainer: Arc<dyn Explainer>, timeout: Duration) -> Self {
        Self { explainer, timeout }
    }

    pub async fn format(&self, parsed: &ParsedQuery, decision: &FinalDecision) -> Formatted {
        if !parsed.is_reliable() {
            return Formatted {
                text: MISSING_INFORMATION.to_string(),
                error: parsed.error.clone(),
            };
        }

        let result = match tokio::time::timeout(self.timeout, self.explainer.explain(parsed, decision)).await {
            Ok(result) => result,
            Err(_) => Err(CollaboratorError::Timeout {
                stage: Stage::Explain,
                limit: self.timeout,
            }),
        };

        match result {
            Ok(text) if !text.trim().is_empty() => Formatted {
                text: text.trim().to_string(),
                error: None,
            },
            Ok(_) => failed(CollaboratorError::Malformed("empty explanation".to_string())),
            Err(e) => failed(e),
        }
    }
}

fn failed(error: CollaboratorError) -> Formatted {
    tracing::warn!(stage = %Stage::Explain, error = %error, "Explanation failed, using fallback");
    Formatted {
        text: format!(
            "We couldn't process your claim explanation due to an error: {}. Please contact support.",
            error
        ),
        error: Some(error.to_string()),
    }
}

/// Deterministic explainer built on the rules-engine summary, for offline runs.
pub struct RulesSummaryExplainer {
    engine: Arc<RulesEngine>,
}

impl RulesSummaryExplainer {
    pub fn new(engine: Arc<RulesEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Explainer for RulesSummaryExplainer {
    async fn explain(&self, _parsed: &ParsedQuery, decision: &FinalDecision) -> CollaboratorResult<String> {
        let mut verdict = ClaimVerdict::new(decision.decision, Some(decision.amount), decision.justification.clone())
            .with_clauses(decision.matched_clauses.clone());
        verdict.details = decision.details.clone();
        if let Some(details) = verdict.details.as_mut() {
            details.approved_amount = decision.amount;
        }
        Ok(self.engine.summarize(&verdict))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::{Clause, Decision};

    struct Fixed(&'static str);

    #[async_trait]
    impl Explainer for Fixed {
        async fn explain(&self, _parsed: &ParsedQuery, _decision: &FinalDecision) -> CollaboratorResult<String> {
            Ok(self.0.to_string())
        }
    }

    struct Down;

    #[async_trait]
    impl Explainer for Down {
        async fn explain(&self, _parsed: &ParsedQuery, _decision: &FinalDecision) -> CollaboratorResult<String> {
            Err(CollaboratorError::Unavailable("connection refused".to_string()))
        }
    }

    struct Slow;

    #[async_trait]
    impl Explainer for Slow {
        async fn explain(&self, _parsed: &ParsedQuery, _decision: &FinalDecision) -> CollaboratorResult<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("too late".to_string())
        }
    }

    fn parsed() -> ParsedQuery {
        ParsedQuery {
            procedure: "knee surgery".to_string(),
            ..Default::default()
        }
    }

    fn approved() -> FinalDecision {
        FinalDecision {
            decision: Decision::Approved,
            amount: 1250.0,
            justification: "Covered.".to_string(),
            matched_clauses: vec![Clause::policy("Covered.")],
            details: None,
        }
    }

    #[tokio::test]
    async fn test_explainer_text_is_used() {
        let formatter = ExplanationFormatter::new(Arc::new(Fixed("  Your claim is approved.  ")), Duration::from_secs(1));
        let formatted = formatter.format(&parsed(), &approved()).await;
        assert_eq!(formatted.text, "Your claim is approved.");
        assert_eq!(formatted.error, None);
    }

    #[tokio::test]
    async fn test_failure_names_the_error() {
        let formatter = ExplanationFormatter::new(Arc::new(Down), Duration::from_secs(1));
        let formatted = formatter.format(&parsed(), &approved()).await;
        assert_eq!(
            formatted.text,
            "We couldn't process your claim explanation due to an error: unavailable: connection refused. Please contact support."
        );
    }

    #[tokio::test]
    async fn test_timeout_falls_back() {
        let formatter = ExplanationFormatter::new(Arc::new(Slow), Duration::from_millis(20));
        let formatted = formatter.format(&parsed(), &approved()).await;
        assert!(formatted.text.contains("explain timed out after 20ms"));
    }

    #[tokio::test]
    async fn test_unreliable_query_gets_missing_information() {
        let formatter = ExplanationFormatter::new(Arc::new(Fixed("unused")), Duration::from_secs(1));
        let formatted = formatter.format(&ParsedQuery::failed("no JSON"), &approved()).await;
        assert_eq!(formatted.text, MISSING_INFORMATION);
        assert_eq!(formatted.error.as_deref(), Some("no JSON"));
    }

    #[tokio::test]
    async fn test_rules_summary_explainer() {
        let explainer = RulesSummaryExplainer::new(Arc::new(RulesEngine::default()));
        let text = explainer.explain(&parsed(), &FinalDecision::rejected("offline")).await.unwrap();
        assert_eq!(text, "Error evaluating claim. Reason: offline");
    }
}

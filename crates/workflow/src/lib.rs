pub mod formatter;
pub mod metrics;
pub mod offline;
pub mod orchestrator;
pub mod reconciler;

pub use formatter::{ExplanationFormatter, Formatted, RulesSummaryExplainer};
pub use metrics::{Metrics, MetricsSnapshot};
pub use offline::Offline;
pub use orchestrator::{ClaimWorkflow, Collaborators, MAX_RETRIES, RunOptions, WorkflowConfig};
pub use reconciler::reconcile;

#[cfg(test)]
mod tests {
    use super::*;
    use claims::Decision;
    use extract::HeuristicStructurer;
    use rules::RulesEngine;
    use std::sync::Arc;

    fn offline_workflow() -> ClaimWorkflow {
        let engine = Arc::new(RulesEngine::default());
        ClaimWorkflow::new(
            engine.clone(),
            Collaborators {
                structurer: Arc::new(HeuristicStructurer::new()),
                retriever: Arc::new(Offline),
                web_search: Arc::new(Offline),
                judge: Arc::new(Offline),
                explainer: Arc::new(RulesSummaryExplainer::new(engine)),
                sink: None,
                normalizer: None,
            },
            WorkflowConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_offline_knee_surgery_claim() {
        let response = offline_workflow()
            .run("46M, knee surgery in Pune, 3-month-old policy", RunOptions::default())
            .await;

        assert_eq!(response.decision, Decision::Approved);
        assert_eq!(response.amount, 1250.0);
        assert!(response.explanation.starts_with("Claim APPROVED! Amount: ₹1250"));
    }

    #[tokio::test]
    async fn test_offline_excluded_condition_is_denied() {
        let response = offline_workflow()
            .run("29F, cosmetic surgery in Mumbai, claim Rs 80,000, 2 year old policy", RunOptions::default())
            .await;

        assert_eq!(response.decision, Decision::Denied);
        assert_eq!(response.amount, 0.0);
        assert!(response.explanation.starts_with("Claim DENIED."));
    }

    #[tokio::test]
    async fn test_offline_unplanned_emergency_is_not_denied() {
        let response = offline_workflow()
            .run(
                "46M, unplanned emergency appendectomy in Pune, 2 year old policy, no pre-authorization",
                RunOptions::default(),
            )
            .await;

        assert_eq!(response.decision, Decision::Approved);
        assert_eq!(response.amount, 3000.0);
    }

    #[tokio::test]
    async fn test_offline_unstated_policy_age_pays_base_amount() {
        let response = offline_workflow()
            .run("46M, knee surgery in Pune", RunOptions::default())
            .await;

        assert_eq!(response.decision, Decision::Approved);
        assert_eq!(response.amount, 5000.0);
        assert!(response.explanation.starts_with("Claim APPROVED! Amount: ₹5000"));
    }

    #[tokio::test]
    async fn test_offline_planned_without_preauthorization_is_denied() {
        let response = offline_workflow()
            .run(
                "32 year old female, planned cataract surgery at Bangalore, policy for 2 years, claim Rs 1,20,000 without pre-authorization",
                RunOptions { trace_mode: true },
            )
            .await;

        assert_eq!(response.decision, Decision::Denied);
        // Denied runs retry until the cap.
        assert_eq!(response.trace.unwrap().attempts, MAX_RETRIES + 1);
    }
}

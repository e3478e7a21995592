use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::schema::{Clause, ParsedQuery};
use crate::trace::WorkflowTrace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    #[serde(alias = "partially approved", alias = "partially-approved")]
    PartiallyApproved,
    Rejected,
    Pending,
    Denied,
    Error,
}

impl Decision {
    /// `denied` and `error` are never overwritten by a weaker outcome.
    pub fn is_sticky(&self) -> bool {
        matches!(self, Decision::Denied | Decision::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approved => "approved",
            Decision::PartiallyApproved => "partially_approved",
            Decision::Rejected => "rejected",
            Decision::Pending => "pending",
            Decision::Denied => "denied",
            Decision::Error => "error",
        }
    }

    /// Lenient parse for labels coming back from the reasoning service.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase().replace(['-', ' '], "_");
        match label.as_str() {
            "approved" => Some(Decision::Approved),
            "partially_approved" | "partial" => Some(Decision::PartiallyApproved),
            "rejected" => Some(Decision::Rejected),
            "pending" => Some(Decision::Pending),
            "denied" => Some(Decision::Denied),
            "error" => Some(Decision::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit record the rules engine attaches to every verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDetails {
    pub claim_amount: f64,
    pub approved_amount: f64,
    pub claim_type: String,
    pub condition: String,
    pub is_pre_existing: bool,
    pub planned_treatment: bool,
    pub pre_authorized: bool,
    pub resolved_limit: f64,
    pub dynamic_limit: Option<f64>,
    pub policy_limits: BTreeMap<String, f64>,
    pub exclusions_applied: bool,
    pub matched_exclusions: Vec<String>,
    pub submission_days: u32,
    pub pre_hosp_days: u32,
    pub post_hosp_days: u32,
    pub cashless_eligible: bool,
    pub claim_settlement_ratio: f64,
}

/// Verdict shape shared by the rules engine and the evidence-based judge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimVerdict {
    pub decision: Decision,
    pub amount: Option<f64>,
    pub justification: String,
    #[serde(default)]
    pub matched_clauses: Vec<Clause>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<RuleDetails>,
    /// Set when the verdict stands in for a failed collaborator call rather
    /// than a substantive judgment.
    #[serde(skip)]
    pub failure: Option<String>,
}

impl ClaimVerdict {
    pub fn new(decision: Decision, amount: Option<f64>, justification: impl Into<String>) -> Self {
        Self {
            decision,
            amount,
            justification: justification.into(),
            matched_clauses: Vec::new(),
            details: None,
            failure: None,
        }
    }

    pub fn with_clauses(mut self, clauses: Vec<Clause>) -> Self {
        self.matched_clauses = clauses;
        self
    }

    /// Rejected verdict standing in for a collaborator that did not answer.
    pub fn internal_failure(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            decision: Decision::Rejected,
            amount: None,
            justification: format!("Error during decision making: {reason}"),
            matched_clauses: Vec::new(),
            details: None,
            failure: Some(reason),
        }
    }

    pub fn is_internal_failure(&self) -> bool {
        self.failure.is_some()
    }
}

/// Reconciled decision: the verdict that won plus the merged clause list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalDecision {
    pub decision: Decision,
    pub amount: f64,
    pub justification: String,
    pub matched_clauses: Vec<Clause>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<RuleDetails>,
}

impl FinalDecision {
    pub fn rejected(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            decision: Decision::Rejected,
            amount: 0.0,
            justification: reason.clone(),
            matched_clauses: vec![Clause::system(reason)],
            details: None,
        }
    }
}

/// The externally visible result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResponse {
    pub query: String,
    pub parsed_query: ParsedQuery,
    pub decision: Decision,
    pub amount: f64,
    pub justifications: Vec<Clause>,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<WorkflowTrace>,
}

impl FinalResponse {
    pub fn new(
        query: impl Into<String>,
        parsed_query: ParsedQuery,
        decision: &FinalDecision,
        explanation: impl Into<String>,
    ) -> Self {
        let mut justifications = decision.matched_clauses.clone();
        if justifications.is_empty() {
            justifications.push(Clause::system(if decision.justification.is_empty() {
                "No justification provided".to_string()
            } else {
                decision.justification.clone()
            }));
        }

        Self {
            query: query.into(),
            parsed_query,
            decision: decision.decision,
            amount: decision.amount.max(0.0),
            justifications,
            explanation: explanation.into(),
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: Option<WorkflowTrace>) -> Self {
        self.trace = trace;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_accepts_spaced_spelling() {
        let d: Decision = serde_json::from_str(r#""partially approved""#).unwrap();
        assert_eq!(d, Decision::PartiallyApproved);
        assert_eq!(serde_json::to_string(&d).unwrap(), r#""partially_approved""#);
        assert_eq!(Decision::from_label("Partially-Approved"), Some(Decision::PartiallyApproved));
        assert_eq!(Decision::from_label("maybe"), None);
    }

    #[test]
    fn internal_failure_is_tagged_and_not_serialized() {
        let verdict = ClaimVerdict::internal_failure("connection refused");
        assert_eq!(verdict.decision, Decision::Rejected);
        assert!(verdict.is_internal_failure());

        let json = serde_json::to_value(&verdict).unwrap();
        assert!(json.get("failure").is_none());
    }

    #[test]
    fn response_never_has_empty_justifications() {
        let decision = FinalDecision {
            decision: Decision::Approved,
            amount: 1250.0,
            justification: String::new(),
            matched_clauses: vec![],
            details: None,
        };
        let response = FinalResponse::new("q", ParsedQuery::default(), &decision, "ok");
        assert_eq!(response.justifications.len(), 1);
        assert_eq!(response.justifications[0].source, crate::ClauseSource::System);
        assert!(response.trace.is_none());
    }

    #[test]
    fn rejected_decision_has_system_clause() {
        let decision = FinalDecision::rejected("Pipeline failed");
        assert_eq!(decision.decision, Decision::Rejected);
        assert_eq!(decision.amount, 0.0);
        assert_eq!(decision.matched_clauses, vec![Clause::system("Pipeline failed")]);
    }
}

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use claims::{ClaimVerdict, Clause, Decision, RuleDetails};

use crate::policy::PolicyRules;

/// Structured claim as evaluated by the rules engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimData {
    pub amount: f64,
    #[serde(rename = "type")]
    pub claim_type: String,
    pub condition: String,
    #[serde(default)]
    pub pre_existing: bool,
    #[serde(default)]
    pub planned_treatment: bool,
    #[serde(default)]
    pub submitted_days: u32,
    #[serde(default)]
    pub pre_hosp_days: u32,
    #[serde(default)]
    pub post_hosp_days: u32,
    #[serde(default)]
    pub pre_authorized: bool,
    /// Coverage limits published by retrieved evidence; the first positive one wins.
    #[serde(default)]
    pub evidence_limits: Vec<f64>,
}

impl ClaimData {
    fn validate(&self) -> Result<(), String> {
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err("amount must be a non-negative number".to_string());
        }
        if self.claim_type.trim().is_empty() {
            return Err("type is required".to_string());
        }
        Ok(())
    }
}

enum FieldKind {
    Number,
    Text,
    Flag,
}

const FIELDS: &[(&str, FieldKind, bool)] = &[
    ("amount", FieldKind::Number, true),
    ("type", FieldKind::Text, true),
    ("condition", FieldKind::Text, true),
    ("pre_existing", FieldKind::Flag, false),
    ("planned_treatment", FieldKind::Flag, false),
    ("pre_authorized", FieldKind::Flag, false),
    ("submitted_days", FieldKind::Number, false),
    ("pre_hosp_days", FieldKind::Number, false),
    ("post_hosp_days", FieldKind::Number, false),
];

/// Deterministic evaluator of claims against a loaded rule set.
///
/// Holds no mutable state; share it behind an `Arc` across concurrent runs.
#[derive(Debug, Clone)]
pub struct RulesEngine {
    rules: PolicyRules,
}

impl RulesEngine {
    pub fn new(rules: PolicyRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &PolicyRules {
        &self.rules
    }

    /// Evaluate a claim. Always returns a verdict; invalid input yields
    /// `Decision::Error` with the offending field named.
    pub fn evaluate(&self, claim: &ClaimData) -> ClaimVerdict {
        if let Err(reason) = claim.validate() {
            return Self::error_verdict(format!("Invalid claim data: {reason}"));
        }

        let rules = &self.rules;
        let claim_type = claim.claim_type.trim().to_lowercase();
        let condition = claim.condition.to_lowercase();

        let mut decision: Option<Decision> = None;
        let mut reasons: Vec<String> = Vec::new();
        let mut approved = claim.amount;

        let dynamic_limit = claim
            .evidence_limits
            .iter()
            .copied()
            .find(|limit| limit.is_finite() && *limit > 0.0);
        let resolved_limit = dynamic_limit.unwrap_or_else(|| rules.type_limit(&claim_type));

        if claim.pre_existing {
            let limit = rules.limit("pre_existing");
            if claim.amount > limit {
                approved = approved.min(limit);
                reasons.push(format!("Claim is for pre-existing condition. Limit is ₹{limit:.0}."));
                escalate(&mut decision, Decision::PartiallyApproved);
            }
        }

        let is_outpatient = rules
            .keywords
            .outpatient
            .iter()
            .any(|kw| claim_type.contains(kw.as_str()) || condition.contains(kw.as_str()));
        if is_outpatient {
            let limit = rules.limit("outpatient");
            if claim.amount > limit {
                approved = approved.min(limit);
                reasons.push(format!("Outpatient claim capped at ₹{limit:.0}."));
                escalate(&mut decision, Decision::PartiallyApproved);
            }
        }

        if rules.keywords.maternity.iter().any(|kw| condition.contains(kw.as_str())) {
            let limit = rules.limit("maternity");
            if claim.amount > limit {
                approved = approved.min(limit);
                reasons.push(format!("Maternity coverage limited to ₹{limit:.0}."));
                escalate(&mut decision, Decision::PartiallyApproved);
            }
        }

        let matched_exclusions: Vec<String> = rules
            .exclusions
            .iter()
            .filter(|ex| condition.contains(&ex.to_lowercase()))
            .cloned()
            .collect();
        if !matched_exclusions.is_empty() {
            escalate(&mut decision, Decision::Denied);
            reasons.push(format!(
                "Claim involves excluded condition: {}.",
                matched_exclusions.join(", ")
            ));
        }

        if claim_type == "hospitalization" {
            let window = &rules.pre_post_hospitalization;
            if claim.pre_hosp_days > window.pre_days {
                escalate(&mut decision, Decision::Denied);
                reasons.push(format!("Exceeds {} days pre-hospitalization coverage.", window.pre_days));
            }
            if claim.post_hosp_days > window.post_days {
                escalate(&mut decision, Decision::Denied);
                reasons.push(format!("Exceeds {} days post-hospitalization coverage.", window.post_days));
            }
        }

        let deadline = rules.claim_process.submission_deadline;
        if claim.submitted_days > deadline {
            escalate(&mut decision, Decision::Denied);
            reasons.push(format!("Claim submitted after {deadline} days."));
        }

        if claim.planned_treatment && !claim.pre_authorized {
            escalate(&mut decision, Decision::Denied);
            reasons.push("Pre-authorization required for planned treatment.".to_string());
        }

        if resolved_limit <= 0.0 {
            escalate(&mut decision, Decision::Pending);
            reasons.push(
                "Unable to determine policy limit from available data. Please contact policy provider for clarification."
                    .to_string(),
            );
        } else if approved > resolved_limit {
            reasons.push(format!(
                "Claim amount ₹{:.0} exceeds policy limit of ₹{resolved_limit:.0}. Approving ₹{resolved_limit:.0}.",
                claim.amount
            ));
            approved = resolved_limit;
            escalate(&mut decision, Decision::PartiallyApproved);
        }

        let decision = decision.unwrap_or(Decision::Approved);
        if reasons.is_empty() {
            reasons.push(format!(
                "Claim amount ₹{:.0} is within the {claim_type} limit of ₹{resolved_limit:.0}.",
                claim.amount
            ));
        }

        debug!(
            decision = %decision,
            claim_amount = claim.amount,
            approved_amount = approved,
            resolved_limit,
            reasons = reasons.len(),
            "Rules evaluated"
        );

        let payout = match decision {
            Decision::Approved | Decision::PartiallyApproved => approved,
            _ => 0.0,
        };

        let details = RuleDetails {
            claim_amount: claim.amount,
            approved_amount: approved,
            claim_type,
            condition,
            is_pre_existing: claim.pre_existing,
            planned_treatment: claim.planned_treatment,
            pre_authorized: claim.pre_authorized,
            resolved_limit,
            dynamic_limit,
            policy_limits: rules.coverage_limits.clone(),
            exclusions_applied: !matched_exclusions.is_empty(),
            matched_exclusions,
            submission_days: claim.submitted_days,
            pre_hosp_days: claim.pre_hosp_days,
            post_hosp_days: claim.post_hosp_days,
            cashless_eligible: rules.network_hospitals,
            claim_settlement_ratio: rules.claim_settlement_ratio,
        };

        let mut verdict = ClaimVerdict::new(decision, Some(payout), reasons.join(" "))
            .with_clauses(reasons.into_iter().map(Clause::medical).collect());
        verdict.details = Some(details);
        verdict
    }

    /// Evaluate loosely-typed claim JSON, e.g. a claim file handed to the CLI.
    /// Also accepts dynamic limits as `web_info: [{"coverage_limit": n}]`.
    pub fn evaluate_json(&self, value: &Value) -> ClaimVerdict {
        let Some(object) = value.as_object() else {
            return Self::error_verdict("Invalid claim data: expected a JSON object".to_string());
        };

        for (name, kind, required) in FIELDS {
            match object.get(*name) {
                None | Some(Value::Null) if *required => {
                    return Self::error_verdict(format!("Missing claim data: {name}"));
                }
                None | Some(Value::Null) => {}
                Some(field) => {
                    let ok = match kind {
                        FieldKind::Number => field.is_number(),
                        FieldKind::Text => field.is_string(),
                        FieldKind::Flag => field.is_boolean(),
                    };
                    if !ok {
                        return Self::error_verdict(format!("Invalid claim data: {name}"));
                    }
                }
            }
        }

        let mut object = object.clone();
        object.retain(|_, v| !v.is_null());
        if let Some(Value::Array(items)) = object.remove("web_info") {
            let limits: Vec<Value> = items
                .iter()
                .filter_map(|item| item.get("coverage_limit").cloned())
                .filter(Value::is_number)
                .collect();
            object
                .entry("evidence_limits")
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Some(Value::Array(existing)) = object.get_mut("evidence_limits") {
                existing.extend(limits);
            }
        }

        match serde_json::from_value::<ClaimData>(Value::Object(object)) {
            Ok(claim) => self.evaluate(&claim),
            Err(e) => {
                warn!(error = %e, "Rejected malformed claim data");
                Self::error_verdict(format!("Invalid claim data: {e}"))
            }
        }
    }

    /// Evaluate a claim given as a JSON string.
    pub fn process_claim(&self, raw: &str) -> ClaimVerdict {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => self.evaluate_json(&value),
            Err(_) => Self::error_verdict("Invalid JSON input".to_string()),
        }
    }

    /// One-line, deterministic explanation of a rules verdict.
    pub fn summarize(&self, verdict: &ClaimVerdict) -> String {
        let reasons = verdict
            .matched_clauses
            .iter()
            .map(|c| c.clause_text.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        match (&verdict.decision, &verdict.details) {
            (Decision::Approved, Some(details)) => format!(
                "Claim APPROVED! Amount: ₹{:.0} approved for {}. Meets policy limit. Pre/Post days within range. (Settlement ratio: {:.2}%)",
                details.approved_amount,
                details.claim_type,
                details.claim_settlement_ratio * 100.0
            ),
            (Decision::PartiallyApproved, Some(details)) => format!(
                "Claim PARTIALLY APPROVED. ₹{:.0} approved out of ₹{:.0}. Reason(s): {reasons}",
                details.approved_amount, details.claim_amount
            ),
            (Decision::Denied, _) => format!("Claim DENIED. Reason(s): {reasons}"),
            (Decision::Pending, _) => format!("Claim PENDING. Reason(s): {reasons}"),
            _ => format!("Error evaluating claim. Reason: {reasons}"),
        }
    }

    fn error_verdict(reason: String) -> ClaimVerdict {
        ClaimVerdict::new(Decision::Error, Some(0.0), reason.clone())
            .with_clauses(vec![Clause::system(reason)])
    }
}

impl Default for RulesEngine {
    fn default() -> Self {
        Self::new(PolicyRules::default())
    }
}

/// Move to `next` unless a sticky outcome is already recorded.
fn escalate(current: &mut Option<Decision>, next: Decision) {
    if current.is_none_or(|d| !d.is_sticky()) {
        *current = Some(next);
    }
}

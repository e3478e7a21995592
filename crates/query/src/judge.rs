use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use claims::{
    ClaimVerdict, Clause, ClauseSource, CollaboratorError, CollaboratorResult, Decision,
    EvidenceJudge, JudgmentRequest, sanitize_amount,
};
use extract::{OllamaClient, collaborator_error};
use rules::Tariff;

use crate::prompt::build_judgment_prompt;

/// Evidence-based judgment backed by the local model.
pub struct LlmJudge {
    llm: OllamaClient,
    tariff_hint: String,
}

impl LlmJudge {
    pub fn new(llm: OllamaClient, tariff: &Tariff) -> Self {
        Self {
            llm,
            tariff_hint: tariff_hint(tariff),
        }
    }
}

#[async_trait]
impl EvidenceJudge for LlmJudge {
    async fn judge(&self, request: JudgmentRequest<'_>) -> CollaboratorResult<ClaimVerdict> {
        let prompt = build_judgment_prompt(
            request.parsed,
            request.chunks,
            request.web_results,
            request.prior,
            &self.tariff_hint,
        );

        let reply = self
            .llm
            .generate_json_with_retry(&prompt, 1)
            .await
            .map_err(collaborator_error)?;

        let value: Value = serde_json::from_str(&reply)
            .map_err(|e| CollaboratorError::Malformed(format!("judgment is not JSON: {}", e)))?;

        let verdict = parse_judgment(&value).map_err(CollaboratorError::Malformed)?;
        tracing::debug!(
            decision = %verdict.decision,
            amount = ?verdict.amount,
            clauses = verdict.matched_clauses.len(),
            "Evidence judgment"
        );
        Ok(verdict)
    }
}

/// "15000 for hip replacement, ..., or 1000 as default"
fn tariff_hint(tariff: &Tariff) -> String {
    let mut parts: Vec<String> = tariff
        .procedures
        .iter()
        .map(|(name, amount)| format!("{:.0} for {}", amount, name))
        .collect();
    parts.push(format!("or {:.0} as default", tariff.default_amount));
    parts.join(", ")
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ClauseEntry {
    Text(String),
    Object {
        #[serde(alias = "text")]
        clause_text: String,
        #[serde(default)]
        source: Option<String>,
    },
}

impl ClauseEntry {
    fn into_clause(self) -> Option<Clause> {
        let (text, source) = match self {
            ClauseEntry::Text(text) => (text, ClauseSource::Policy),
            ClauseEntry::Object { clause_text, source } => (
                clause_text,
                source.as_deref().map(ClauseSource::from_label).unwrap_or(ClauseSource::Policy),
            ),
        };
        let text = text.trim();
        (!text.is_empty()).then(|| Clause::new(text, source))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Justification {
    Text(String),
    Clauses(Vec<ClauseEntry>),
}

/// Normalize a model judgment into a `ClaimVerdict`. The justification may
/// arrive as a string or as a clause list; either way it leaves here as text
/// plus clauses.
pub fn parse_judgment(value: &Value) -> Result<ClaimVerdict, String> {
    let object = value.as_object().ok_or_else(|| "judgment is not a JSON object".to_string())?;

    let label = object
        .get("decision")
        .and_then(Value::as_str)
        .ok_or_else(|| "judgment has no decision".to_string())?;
    let decision = Decision::from_label(label).ok_or_else(|| format!("unknown decision: {}", label))?;

    let amount = match object.get("amount") {
        Some(Value::Number(n)) => n.as_f64().and_then(sanitize_amount),
        Some(Value::String(s)) => s.replace([',', '₹'], "").trim().parse().ok().and_then(sanitize_amount),
        _ => None,
    };

    let mut matched_clauses: Vec<Clause> = object
        .get("matched_clauses")
        .cloned()
        .and_then(|v| serde_json::from_value::<Vec<ClauseEntry>>(v).ok())
        .unwrap_or_default()
        .into_iter()
        .filter_map(ClauseEntry::into_clause)
        .collect();

    let justification = match object
        .get("justification")
        .cloned()
        .and_then(|v| serde_json::from_value::<Justification>(v).ok())
    {
        Some(Justification::Text(text)) => text.trim().to_string(),
        Some(Justification::Clauses(entries)) => {
            let clauses: Vec<Clause> = entries.into_iter().filter_map(ClauseEntry::into_clause).collect();
            let text = clauses
                .iter()
                .map(|c| c.clause_text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            for clause in clauses.into_iter().rev() {
                if !matched_clauses.contains(&clause) {
                    matched_clauses.insert(0, clause);
                }
            }
            text
        }
        None => String::new(),
    };

    Ok(ClaimVerdict::new(decision, amount, justification).with_clauses(matched_clauses))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_justification() {
        let verdict = parse_judgment(&json!({
            "decision": "partially approved",
            "amount": "1,250",
            "justification": "Covered after the waiting period.",
            "matched_clauses": [
                {"clause_text": "Knee surgery is covered.", "source": "policy"},
                {"clause_text": "Rates vary by city.", "source": "Web Search"},
                "Bare clause"
            ]
        }))
        .unwrap();

        assert_eq!(verdict.decision, Decision::PartiallyApproved);
        assert_eq!(verdict.amount, Some(1250.0));
        assert_eq!(verdict.justification, "Covered after the waiting period.");
        assert_eq!(verdict.matched_clauses.len(), 3);
        assert_eq!(verdict.matched_clauses[1].source, ClauseSource::Web);
        assert_eq!(verdict.matched_clauses[2].source, ClauseSource::Policy);
        assert!(!verdict.is_internal_failure());
    }

    #[test]
    fn test_clause_list_justification() {
        let verdict = parse_judgment(&json!({
            "decision": "rejected",
            "amount": -50,
            "justification": [
                {"clause_text": "Waiting period not met.", "source": "policy"},
                {"text": "Pre-authorization missing.", "source": "medical"}
            ]
        }))
        .unwrap();

        assert_eq!(verdict.decision, Decision::Rejected);
        assert_eq!(verdict.amount, Some(0.0));
        assert_eq!(verdict.justification, "Waiting period not met. Pre-authorization missing.");
        assert_eq!(verdict.matched_clauses[1], Clause::medical("Pre-authorization missing."));
    }

    #[test]
    fn test_missing_or_unknown_decision_is_malformed() {
        assert!(parse_judgment(&json!({"amount": 10})).is_err());
        assert!(parse_judgment(&json!({"decision": "maybe"})).is_err());
        assert!(parse_judgment(&json!("approved")).is_err());
    }

    #[test]
    fn test_tariff_hint_lists_every_procedure() {
        let hint = tariff_hint(&Tariff::default());
        assert!(hint.contains("5000 for knee surgery"));
        assert!(hint.ends_with("or 1000 as default"));
    }
}

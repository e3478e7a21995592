use claims::{ClaimVerdict, Clause, ClauseSource, FinalDecision};

/// Merge the rules-engine verdict with the evidence-based verdict.
///
/// The rules engine is authoritative when nothing was retrieved or the
/// evidence-based judgment failed internally. Otherwise the evidence-based
/// verdict wins, with any disagreement noted in the justification.
/// `matched_clauses` is always evidence clauses followed by rules reasons.
pub fn reconcile(rules: &ClaimVerdict, evidence: &ClaimVerdict, chunks_retrieved: usize) -> FinalDecision {
    let mut matched_clauses = evidence.matched_clauses.clone();
    matched_clauses.extend(rules_reasons(rules));

    let rules_amount = rules.amount.unwrap_or(0.0);

    if let Some(reason) = fallback_reason(evidence, chunks_retrieved) {
        return FinalDecision {
            decision: rules.decision,
            amount: rules_amount.max(0.0),
            justification: format!(
                "{}. Using rules engine verdict because {}.",
                trim_sentence(&rules.justification),
                reason
            ),
            matched_clauses,
            details: rules.details.clone(),
        };
    }

    let base = if evidence.justification.trim().is_empty() {
        rules.justification.trim()
    } else {
        evidence.justification.trim()
    };

    let justification = if evidence.decision == rules.decision {
        base.to_string()
    } else {
        format!(
            "{}. Overriding rules engine outcome ({}) based on retrieved evidence.",
            trim_sentence(base),
            rules.decision
        )
    };

    FinalDecision {
        decision: evidence.decision,
        amount: evidence.amount.unwrap_or(rules_amount).max(0.0),
        justification,
        matched_clauses,
        details: rules.details.clone(),
    }
}

/// Whether `reconcile` would fall back to the rules engine.
pub fn uses_rules_fallback(evidence: &ClaimVerdict, chunks_retrieved: usize) -> bool {
    fallback_reason(evidence, chunks_retrieved).is_some()
}

fn fallback_reason(evidence: &ClaimVerdict, chunks_retrieved: usize) -> Option<String> {
    if chunks_retrieved == 0 {
        return Some("no policy evidence was retrieved".to_string());
    }
    evidence
        .failure
        .as_ref()
        .map(|failure| format!("the evidence-based judgment failed ({})", failure))
}

fn rules_reasons(rules: &ClaimVerdict) -> Vec<Clause> {
    if rules.matched_clauses.is_empty() {
        let text = rules.justification.trim();
        return if text.is_empty() {
            Vec::new()
        } else {
            vec![Clause::medical(text)]
        };
    }

    rules
        .matched_clauses
        .iter()
        .map(|clause| match clause.source {
            ClauseSource::Medical | ClauseSource::System => clause.clone(),
            _ => Clause::medical(clause.clause_text.clone()),
        })
        .collect()
}

fn trim_sentence(text: &str) -> &str {
    text.trim().trim_end_matches('.')
}

use claims::{ClaimVerdict, EvidenceChunk, FinalDecision, ParsedQuery, WebResult};

fn age_label(parsed: &ParsedQuery) -> String {
    parsed.age.map(|a| a.to_string()).unwrap_or_else(|| "N/A".to_string())
}

fn duration_label(parsed: &ParsedQuery) -> String {
    parsed
        .policy_duration_months
        .map(|m| format!("{} months", m))
        .unwrap_or_else(|| "N/A".to_string())
}

fn or_na(text: &str) -> &str {
    if text.trim().is_empty() { "N/A" } else { text }
}

pub fn build_judgment_prompt(
    parsed: &ParsedQuery,
    chunks: &[EvidenceChunk],
    web_results: &[WebResult],
    prior: Option<&ClaimVerdict>,
    tariff_hint: &str,
) -> String {
    let policy_clauses = if chunks.is_empty() {
        "None".to_string()
    } else {
        chunks
            .iter()
            .enumerate()
            .map(|(i, c)| format!("[Clause {}] {}", i + 1, c.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    let web_clauses = if web_results.is_empty() {
        "None".to_string()
    } else {
        web_results
            .iter()
            .map(|w| format!("- {}: {}", w.title, w.snippet))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let rules_context = match prior {
        Some(verdict) => serde_json::to_string(verdict).unwrap_or_else(|_| verdict.justification.clone()),
        None => "None".to_string(),
    };

    format!(
        r#"You are an expert health insurance claim analyst.

CLAIMANT:
- Age: {}
- Gender: {}
- Location: {}
- Procedure: {}
- Policy Duration: {}

RELEVANT POLICY CLAUSES (prioritize these over web results if conflicts arise):
{}

WEB RESULTS:
{}

RULES ENGINE DECISION:
{}

INSTRUCTIONS:
- Prioritize the policy clauses over web results and the rules engine decision when they conflict
- For planned surgeries, check whether pre-authorization is required and deny if it is missing
- Suggest an amount based on the procedure: {}. Scale by policy duration (max 100% of the base amount over 12 months)
- Output ONLY a JSON object with:
  - "decision": "approved", "partially approved" or "rejected"
  - "amount": number
  - "justification": concise explanation
  - "matched_clauses": list of objects with "clause_text" and "source" ("policy", "web" or "medical")
- No markdown, no commentary

JSON OUTPUT:"#,
        age_label(parsed),
        parsed.gender.as_str(),
        or_na(&parsed.location),
        or_na(&parsed.procedure),
        duration_label(parsed),
        policy_clauses,
        web_clauses,
        rules_context,
        tariff_hint,
    )
}

pub fn build_explanation_prompt(parsed: &ParsedQuery, decision: &FinalDecision) -> String {
    let justification = if decision.justification.trim().is_empty() {
        "No justification provided"
    } else {
        decision.justification.as_str()
    };

    format!(
        r#"You are a helpful customer support assistant who explains health insurance decisions in simple terms.

A user filed a health insurance claim with these details:
- Age: {}
- Gender: {}
- Procedure: {}
- Location: {}
- Policy Duration: {}

The claim decision was: {}
Approved Amount: ₹{:.0}

Justification from the evaluator:
{}

INSTRUCTIONS:
- Summarize this claim decision in 3-4 sentences using simple, clear language suitable for the customer
- Include the approved amount if the claim is approved or partially approved
- Do not add facts that are not stated above

EXPLANATION:"#,
        age_label(parsed),
        parsed.gender.as_str(),
        or_na(&parsed.procedure),
        or_na(&parsed.location),
        duration_label(parsed),
        decision.decision,
        decision.amount,
        justification,
    )
}

pub fn build_detection_prompt(text: &str) -> String {
    format!(
        r#"Detect the language of the text below and translate it to English.

Output ONLY a JSON object of the form {{"language": "<ISO 639-1 code>", "english": "<English translation>"}}.
If the text is already English, copy it unchanged and use "en".

TEXT:
{}

JSON OUTPUT:"#,
        text
    )
}

pub fn build_translation_prompt(text: &str, language: &str) -> String {
    format!(
        r#"Translate the text below from English into the language with ISO 639-1 code "{}".
Keep amounts, numbers and names unchanged. Output ONLY the translation.

TEXT:
{}

TRANSLATION:"#,
        language, text
    )
}

pub fn build_faq_prompt(question: &str, context: &str) -> String {
    format!(
        r#"You are an expert health insurance policy assistant.

CONTEXT FROM THE POLICY:
{}

USER QUESTION: {}

INSTRUCTIONS:
- Write a clear, concise and accurate answer using only the policy context above
- If the context partially answers the question, summarize what is available
- If there is no relevant content, respond with: "This information is not available in the policy database."

ANSWER:"#,
        context, question
    )
}

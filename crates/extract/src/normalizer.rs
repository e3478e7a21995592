use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;

use claims::{Gender, ParsedQuery, sanitize_amount};

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*```[a-zA-Z]*\s*(.*?)\s*```\s*$").expect("static regex"));
static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.,!?;:']").expect("static regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

/// Remove a surrounding markdown code fence (```json ... ```), if any.
pub fn strip_code_fence(reply: &str) -> &str {
    match CODE_FENCE.captures(reply).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => reply.trim(),
    }
}

/// Lowercase, drop punctuation, collapse whitespace.
pub fn clean_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = PUNCTUATION.replace_all(lowered.trim(), "");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

pub struct FieldNormalizer {
    /// Maps legacy or alternate city names -> canonical name
    city_aliases: HashMap<String, String>,
}

impl FieldNormalizer {
    pub fn new() -> Self {
        let city_aliases = [
            ("bombay", "mumbai"),
            ("bangalore", "bengaluru"),
            ("madras", "chennai"),
            ("calcutta", "kolkata"),
            ("poona", "pune"),
            ("gurgaon", "gurugram"),
        ]
        .into_iter()
        .map(|(alias, canonical)| (alias.to_string(), canonical.to_string()))
        .collect();

        Self { city_aliases }
    }

    pub fn normalize_procedure(&self, procedure: &str) -> String {
        clean_text(procedure)
    }

    /// Canonical, title-cased city name.
    pub fn normalize_location(&self, location: &str) -> String {
        let cleaned = clean_text(location);
        let canonical = self.city_aliases.get(&cleaned).cloned().unwrap_or(cleaned);
        canonical
            .split(' ')
            .filter(|w| !w.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Build a `ParsedQuery` from loosely-typed model output. Numbers given
    /// as strings are accepted; negative numbers are clamped to zero.
    pub fn parsed_from_value(&self, value: &Value) -> Result<ParsedQuery, String> {
        let object = value
            .as_object()
            .ok_or_else(|| "expected a JSON object".to_string())?;

        if let Some(error) = object.get("error").and_then(Value::as_str) {
            return Ok(ParsedQuery::failed(error));
        }

        let text = |key: &str| object.get(key).and_then(Value::as_str).unwrap_or("").to_string();
        let count = |key: &str| number(object.get(key)).map(|n| n.max(0.0).round() as u32);
        let flag = |key: &str| object.get(key).and_then(boolean);

        Ok(ParsedQuery {
            age: count("age"),
            gender: object
                .get("gender")
                .and_then(Value::as_str)
                .map(Gender::from_label)
                .unwrap_or_default(),
            procedure: self.normalize_procedure(&text("procedure")),
            location: self.normalize_location(&text("location")),
            policy_duration_months: count("policy_duration_months"),
            claim_amount: number(object.get("claim_amount").or_else(|| object.get("amount")))
                .and_then(sanitize_amount),
            claim_type: Some(clean_text(&text("claim_type")))
                .filter(|t| !t.is_empty() && t != "null"),
            pre_existing: flag("pre_existing"),
            pre_authorized: flag("pre_authorized"),
            planned_treatment: flag("planned_treatment"),
            submitted_days: count("submitted_days"),
            pre_hosp_days: count("pre_hosp_days"),
            post_hosp_days: count("post_hosp_days"),
            error: None,
        })
    }
}

impl Default for FieldNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.replace(',', "").trim().parse().ok(),
        _ => None,
    }
}

fn boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn test_normalization() {
        let normalizer = FieldNormalizer::new();

        assert_eq!(normalizer.normalize_procedure("  Knee   Surgery. "), "knee surgery");
        assert_eq!(normalizer.normalize_location("pune"), "Pune");
        assert_eq!(normalizer.normalize_location("Bombay"), "Mumbai");
        assert_eq!(normalizer.normalize_location("new delhi"), "New Delhi");
    }

    #[test]
    fn test_lenient_model_output() {
        let normalizer = FieldNormalizer::new();
        let parsed = normalizer
            .parsed_from_value(&json!({
                "age": "46",
                "gender": "M",
                "procedure": "Knee surgery",
                "location": "pune",
                "policy_duration_months": 3,
                "claim_amount": "-200",
                "claim_type": null,
                "pre_authorized": "yes"
            }))
            .unwrap();

        assert_eq!(parsed.age, Some(46));
        assert_eq!(parsed.gender, Gender::Male);
        assert_eq!(parsed.procedure, "knee surgery");
        assert_eq!(parsed.location, "Pune");
        assert_eq!(parsed.policy_duration_months, Some(3));
        assert_eq!(parsed.claim_amount, Some(0.0));
        assert_eq!(parsed.claim_type, None);
        assert_eq!(parsed.pre_authorized, Some(true));
        assert!(parsed.is_reliable());
    }

    #[test]
    fn test_non_object_is_rejected() {
        let normalizer = FieldNormalizer::new();
        assert!(normalizer.parsed_from_value(&json!([1, 2])).is_err());

        let parsed = normalizer.parsed_from_value(&json!({"error": "cannot parse"})).unwrap();
        assert!(!parsed.is_reliable());
    }
}

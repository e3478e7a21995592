use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Unknown,
}

impl Gender {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "m" | "male" | "man" => Gender::Male,
            "f" | "female" | "woman" => Gender::Female,
            _ => Gender::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Unknown => "unknown",
        }
    }
}

impl<'de> Deserialize<'de> for Gender {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = Option::<String>::deserialize(deserializer)?;
        Ok(label.map(|l| Gender::from_label(&l)).unwrap_or_default())
    }
}

/// Structured claim facts extracted from a free-text query.
///
/// Built once per run and never mutated afterwards. A present `error`
/// means structuring failed and none of the other fields can be trusted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedQuery {
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub procedure: String,
    #[serde(default)]
    pub location: String,
    /// Age of the policy; `None` when the query does not say.
    #[serde(default)]
    pub policy_duration_months: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_existing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_authorized: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planned_treatment: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_hosp_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_hosp_days: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ParsedQuery {
    /// Placeholder produced when structuring failed.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn is_reliable(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClauseSource {
    Policy,
    Web,
    Medical,
    System,
}

impl ClauseSource {
    /// Lenient mapping for labels produced by the reasoning service
    /// ("policy clause", "Web Results", "medical policy decision", ...).
    pub fn from_label(label: &str) -> Self {
        let label = label.to_lowercase();
        if label.contains("web") {
            ClauseSource::Web
        } else if label.contains("medical") || label.contains("rule") {
            ClauseSource::Medical
        } else if label.contains("system") {
            ClauseSource::System
        } else {
            ClauseSource::Policy
        }
    }
}

/// The one justification-entry shape carried through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    pub clause_text: String,
    pub source: ClauseSource,
}

impl Clause {
    pub fn new(clause_text: impl Into<String>, source: ClauseSource) -> Self {
        Self {
            clause_text: clause_text.into(),
            source,
        }
    }

    pub fn policy(text: impl Into<String>) -> Self {
        Self::new(text, ClauseSource::Policy)
    }

    pub fn web(text: impl Into<String>) -> Self {
        Self::new(text, ClauseSource::Web)
    }

    pub fn medical(text: impl Into<String>) -> Self {
        Self::new(text, ClauseSource::Medical)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(text, ClauseSource::System)
    }
}

/// A unit of retrieved policy text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceChunk {
    pub text: String,
    pub score: f32,
    /// Numeric limit published alongside the chunk, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage_limit: Option<f64>,
}

impl EvidenceChunk {
    pub fn new(text: impl Into<String>, score: f32) -> Self {
        Self {
            text: text.into(),
            score,
            coverage_limit: None,
        }
    }

    /// Sort by descending similarity score.
    pub fn rank(chunks: &mut [EvidenceChunk]) {
        chunks.sort_by(|a, b| b.score.total_cmp(&a.score));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub snippet: String,
    #[serde(default)]
    pub link: String,
    #[serde(default = "web_source")]
    pub source: String,
}

fn web_source() -> String {
    "web".to_string()
}

impl WebResult {
    pub fn new(title: impl Into<String>, snippet: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            snippet: snippet.into(),
            link: link.into(),
            source: web_source(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gender_accepts_shorthand_and_null() {
        let parsed: ParsedQuery =
            serde_json::from_str(r#"{"age": 46, "gender": "M", "procedure": "knee surgery"}"#).unwrap();
        assert_eq!(parsed.gender, Gender::Male);

        let parsed: ParsedQuery = serde_json::from_str(r#"{"gender": null}"#).unwrap();
        assert_eq!(parsed.gender, Gender::Unknown);

        let parsed: ParsedQuery = serde_json::from_str(r#"{"gender": "other"}"#).unwrap();
        assert_eq!(parsed.gender, Gender::Unknown);
    }

    #[test]
    fn failed_query_is_not_reliable() {
        let parsed = ParsedQuery::failed("structurer timed out");
        assert!(!parsed.is_reliable());
        assert_eq!(parsed.policy_duration_months, None);

        let json = serde_json::to_value(&parsed).unwrap();
        assert_eq!(json["error"], "structurer timed out");
    }

    #[test]
    fn clause_source_labels() {
        assert_eq!(ClauseSource::from_label("Web Results"), ClauseSource::Web);
        assert_eq!(ClauseSource::from_label("medical"), ClauseSource::Medical);
        assert_eq!(ClauseSource::from_label("Relevant Policy Clauses"), ClauseSource::Policy);
        assert_eq!(ClauseSource::from_label("system"), ClauseSource::System);
    }

    #[test]
    fn rank_orders_by_descending_score() {
        let mut chunks = vec![
            EvidenceChunk::new("b", 0.4),
            EvidenceChunk::new("a", 0.9),
            EvidenceChunk::new("c", 0.7),
        ];
        EvidenceChunk::rank(&mut chunks);
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "c", "b"]);
    }
}

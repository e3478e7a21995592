use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use claims::{CollaboratorError, CollaboratorResult, Gender, ParsedQuery, QueryStructurer};

use crate::normalizer::FieldNormalizer;

static AGE_GENDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,3})\s*(?:-?\s*(?:years?|yrs?|y)(?:\s*-?\s*old)?)?\s*,?\s*(male|female|m|f)\b")
        .expect("static regex")
});
static POLICY_AGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+)\s*-?\s*(months?|years?|yrs?)(?:\s*-?\s*old)?\s+(?:insurance\s+)?policy")
        .expect("static regex")
});
static POLICY_FOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)policy\s+(?:is\s+|of\s+|for\s+|since\s+)?(\d+)\s*(months?|years?|yrs?)")
        .expect("static regex")
});
static LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:in|at|from)\s+([A-Z][a-zA-Z]+(?:\s+[A-Z][a-zA-Z]+)?)").expect("static regex")
});
static AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\brs\.?|\binr|₹)\s*(\d[\d,]*(?:\.\d+)?)").expect("static regex")
});
static LAKH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*lakhs?\b").expect("static regex"));
static PLANNED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:planned|elective)\b").expect("static regex"));
static UNPLANNED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:unplanned|emergency)\b").expect("static regex"));
static LOCATION_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+(?:in|at|from)\s+[A-Z].*$").expect("static regex"));

const PROCEDURE_HINTS: &[&str] = &[
    "surgery", "replacement", "bypass", "ectomy", "treatment", "therapy", "transplant",
    "delivery", "maternity", "fracture", "hospitalization", "opd", "consultation",
];

/// Offline structurer for terse claim shorthand such as
/// `"46M, knee surgery in Pune, 3-month-old policy"`.
#[derive(Default)]
pub struct HeuristicStructurer {
    normalizer: FieldNormalizer,
}

impl HeuristicStructurer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(&self, raw_query: &str) -> ParsedQuery {
        let lowered = raw_query.to_lowercase();
        let mut parsed = ParsedQuery::default();

        if let Some(caps) = AGE_GENDER.captures(raw_query) {
            parsed.age = caps[1].parse().ok();
            parsed.gender = Gender::from_label(&caps[2]);
        }

        if let Some(caps) = POLICY_AGE.captures(raw_query).or_else(|| POLICY_FOR.captures(raw_query)) {
            parsed.policy_duration_months = caps[1].parse::<u32>().ok().map(|n| {
                if caps[2].to_lowercase().starts_with('m') { n } else { n.saturating_mul(12) }
            });
        }

        if let Some(caps) = LOCATION.captures(raw_query) {
            parsed.location = self.normalizer.normalize_location(&caps[1]);
        }

        parsed.claim_amount = AMOUNT
            .captures(raw_query)
            .and_then(|caps| caps[1].replace(',', "").parse::<f64>().ok())
            .or_else(|| {
                LAKH.captures(raw_query)
                    .and_then(|caps| caps[1].parse::<f64>().ok())
                    .map(|n| n * 100_000.0)
            });

        parsed.procedure = self.find_procedure(raw_query);

        if lowered.contains("outpatient") || lowered.contains("opd") {
            parsed.claim_type = Some("outpatient".to_string());
        }
        if lowered.contains("pre-existing") || lowered.contains("preexisting") {
            parsed.pre_existing = Some(true);
        }
        if UNPLANNED.is_match(raw_query) {
            parsed.planned_treatment = Some(false);
        } else if PLANNED.is_match(raw_query) {
            parsed.planned_treatment = Some(true);
        }
        if lowered.contains("without pre-auth") || lowered.contains("not pre-auth") || lowered.contains("no pre-auth") {
            parsed.pre_authorized = Some(false);
        } else if lowered.contains("pre-auth") {
            parsed.pre_authorized = Some(true);
        }

        parsed
    }

    /// The comma-separated segment that names the treatment, minus any
    /// trailing "in <City>".
    fn find_procedure(&self, raw_query: &str) -> String {
        let segments: Vec<&str> = raw_query
            .split([',', ';'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter(|s| !POLICY_AGE.is_match(s) && !POLICY_FOR.is_match(s))
            .collect();

        let candidate = segments
            .iter()
            .find(|s| {
                let lowered = s.to_lowercase();
                PROCEDURE_HINTS.iter().any(|hint| lowered.contains(hint))
            })
            .or_else(|| segments.iter().find(|s| !AGE_GENDER.is_match(s)));

        match candidate {
            Some(segment) => {
                let without_city = LOCATION_TAIL.replace(segment, "");
                let without_age = AGE_GENDER.replace(&without_city, "");
                self.normalizer.normalize_procedure(&without_age)
            }
            None => String::new(),
        }
    }
}

#[async_trait]
impl QueryStructurer for HeuristicStructurer {
    async fn structure(&self, raw_text: &str) -> CollaboratorResult<ParsedQuery> {
        if raw_text.trim().is_empty() {
            return Err(CollaboratorError::Malformed("raw query is empty".to_string()));
        }
        Ok(self.parse(raw_text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorthand_query() {
        let parsed = HeuristicStructurer::new().parse("46M, knee surgery in Pune, 3-month-old policy");

        assert_eq!(parsed.age, Some(46));
        assert_eq!(parsed.gender, Gender::Male);
        assert_eq!(parsed.procedure, "knee surgery");
        assert_eq!(parsed.location, "Pune");
        assert_eq!(parsed.policy_duration_months, Some(3));
        assert_eq!(parsed.claim_amount, None);
        assert!(parsed.is_reliable());
    }

    #[test]
    fn test_long_form_query() {
        let parsed = HeuristicStructurer::new().parse(
            "32 year old female, planned cataract surgery at Bangalore, policy for 2 years, claim Rs 1,20,000 without pre-authorization",
        );

        assert_eq!(parsed.age, Some(32));
        assert_eq!(parsed.gender, Gender::Female);
        assert_eq!(parsed.procedure, "planned cataract surgery");
        assert_eq!(parsed.location, "Bengaluru");
        assert_eq!(parsed.policy_duration_months, Some(24));
        assert_eq!(parsed.claim_amount, Some(120_000.0));
        assert_eq!(parsed.planned_treatment, Some(true));
        assert_eq!(parsed.pre_authorized, Some(false));
    }

    #[test]
    fn test_unplanned_emergency_is_not_planned() {
        let parsed = HeuristicStructurer::new().parse(
            "46M, unplanned emergency appendectomy in Pune, 2 year old policy, no pre-authorization",
        );
        assert_eq!(parsed.planned_treatment, Some(false));
        assert_eq!(parsed.pre_authorized, Some(false));

        let parsed = HeuristicStructurer::new().parse("29F, preplanned surgery consultation");
        assert_eq!(parsed.planned_treatment, None);
    }

    #[test]
    fn test_lakh_amounts() {
        let parsed = HeuristicStructurer::new().parse("hip replacement, 2.5 lakh, 1 year old policy");
        assert_eq!(parsed.claim_amount, Some(250_000.0));
        assert_eq!(parsed.procedure, "hip replacement");
        assert_eq!(parsed.policy_duration_months, Some(12));
    }

    #[tokio::test]
    async fn test_empty_query_is_malformed() {
        let result = HeuristicStructurer::new().structure("   ").await;
        assert!(matches!(result, Err(CollaboratorError::Malformed(_))));
    }
}

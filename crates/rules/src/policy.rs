use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use crate::tariff::Tariff;

/// Coverage rules of a health policy. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyRules {
    /// Limits keyed by claim type, plus `pre_existing` and `sum_insured_max`.
    /// Limits named in a policy file override the built-in ones; the rest are kept.
    #[serde(deserialize_with = "limits_over_defaults")]
    pub coverage_limits: BTreeMap<String, f64>,
    pub pre_post_hospitalization: HospitalizationWindow,
    pub exclusions: Vec<String>,
    pub claim_process: ClaimProcess,
    pub network_hospitals: bool,
    pub claim_settlement_ratio: f64,
    pub keywords: PolicyKeywords,
    pub tariff: Tariff,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HospitalizationWindow {
    pub pre_days: u32,
    pub post_days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimProcess {
    pub submission_deadline: u32,
    pub cashless_approval_time: u32,
    pub pre_authorization: bool,
    pub free_look_period: u32,
}

/// Keywords that route a claim to the outpatient and maternity caps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyKeywords {
    pub outpatient: Vec<String>,
    pub maternity: Vec<String>,
}

impl Default for PolicyKeywords {
    fn default() -> Self {
        Self {
            outpatient: vec!["outpatient".to_string(), "opd".to_string()],
            maternity: vec!["maternity".to_string()],
        }
    }
}

impl Default for PolicyRules {
    fn default() -> Self {
        let coverage_limits = [
            ("hospitalization", 500_000.0),
            ("pre_existing", 100_000.0),
            ("outpatient", 20_000.0),
            ("maternity", 30_000.0),
            ("sum_insured_max", 5_000_000.0),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            coverage_limits,
            pre_post_hospitalization: HospitalizationWindow {
                pre_days: 60,
                post_days: 90,
            },
            exclusions: vec![
                "Cosmetic surgery".to_string(),
                "Experimental treatments".to_string(),
                "Self-inflicted injuries".to_string(),
                "HIV/AIDS".to_string(),
                "Non-medical expenses".to_string(),
            ],
            claim_process: ClaimProcess {
                submission_deadline: 30,
                cashless_approval_time: 60,
                pre_authorization: true,
                free_look_period: 30,
            },
            network_hospitals: true,
            claim_settlement_ratio: 0.9064,
            keywords: PolicyKeywords::default(),
            tariff: Tariff::default(),
        }
    }
}

impl PolicyRules {
    /// Load rules from a JSON file. A missing or malformed source is logged
    /// and the built-in rule set is used instead.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            info!("No policy file configured, using default rules");
            return Self::default();
        };

        if !path.exists() {
            warn!(path = %path.display(), "Policy file not found, using default rules");
            return Self::default();
        }

        match Self::from_file(path) {
            Ok(rules) => {
                info!(
                    path = %path.display(),
                    exclusions = rules.exclusions.len(),
                    "Loaded policy rules"
                );
                rules
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Invalid policy file, using default rules");
                Self::default()
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read policy file {}", path.display()))?;
        serde_json::from_str(&content).context("Failed to parse policy rules")
    }

    /// Named limit, 0 when the rule set does not define it.
    pub fn limit(&self, name: &str) -> f64 {
        self.coverage_limits.get(name).copied().unwrap_or(0.0)
    }

    /// Default limit for a claim type; unknown types get the sum insured.
    pub fn type_limit(&self, claim_type: &str) -> f64 {
        self.coverage_limits
            .get(claim_type)
            .copied()
            .unwrap_or_else(|| self.limit("sum_insured_max"))
    }
}

fn limits_over_defaults<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error> {
    let overrides = BTreeMap::<String, f64>::deserialize(deserializer)?;
    let mut limits = PolicyRules::default().coverage_limits;
    limits.extend(overrides);
    Ok(limits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file(content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("policy-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let rules = PolicyRules::load(Some(Path::new("/nonexistent/local_policy.json")));
        assert_eq!(rules, PolicyRules::default());
        assert_eq!(PolicyRules::load(None), PolicyRules::default());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let path = temp_file("{ not json");
        let rules = PolicyRules::load(Some(&path));
        assert_eq!(rules, PolicyRules::default());
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn partial_file_keeps_default_sections() {
        let path = temp_file(r#"{"exclusions": ["Dental"], "claim_settlement_ratio": 0.95}"#);
        let rules = PolicyRules::load(Some(&path));
        assert_eq!(rules.exclusions, vec!["Dental".to_string()]);
        assert_eq!(rules.claim_settlement_ratio, 0.95);
        assert_eq!(rules.limit("hospitalization"), 500_000.0);
        std::fs::remove_file(path).ok();

        let path = temp_file(r#"{"coverage_limits": {"hospitalization": 400000, "dental": 15000}}"#);
        let rules = PolicyRules::load(Some(&path));
        assert_eq!(rules.limit("hospitalization"), 400_000.0);
        assert_eq!(rules.limit("dental"), 15_000.0);
        assert_eq!(rules.limit("pre_existing"), 100_000.0);
        assert_eq!(rules.limit("outpatient"), 20_000.0);
        assert_eq!(rules.limit("maternity"), 30_000.0);
        assert_eq!(rules.type_limit("surgery"), 5_000_000.0);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn unknown_claim_type_uses_sum_insured() {
        let rules = PolicyRules::default();
        assert_eq!(rules.type_limit("hospitalization"), 500_000.0);
        assert_eq!(rules.type_limit("surgery"), 5_000_000.0);
        assert_eq!(rules.limit("dental"), 0.0);
    }
}

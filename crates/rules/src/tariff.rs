use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Base payout per procedure, used to estimate a claim amount when the
/// claimant did not state one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tariff {
    pub procedures: BTreeMap<String, f64>,
    pub default_amount: f64,
}

impl Default for Tariff {
    fn default() -> Self {
        let procedures = [
            ("hip replacement", 15_000.0),
            ("knee surgery", 5_000.0),
            ("heart bypass surgery", 20_000.0),
            ("appendectomy", 3_000.0),
            ("cataract surgery", 2_000.0),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            procedures,
            default_amount: 1_000.0,
        }
    }
}

impl Tariff {
    /// Base amount for the procedure. The longest matching tariff entry wins.
    pub fn base_amount(&self, procedure: &str) -> f64 {
        let procedure = procedure.trim().to_lowercase();
        if procedure.is_empty() {
            return self.default_amount;
        }

        self.procedures
            .iter()
            .filter(|(name, _)| procedure.contains(name.as_str()))
            .max_by_key(|(name, _)| name.len())
            .map(|(_, amount)| *amount)
            .unwrap_or(self.default_amount)
    }

    /// Base amount scaled by policy age, reaching 100% at 12 months.
    /// An unknown policy age gets the full base amount.
    pub fn estimate(&self, procedure: &str, policy_duration_months: Option<u32>) -> f64 {
        let fraction = policy_duration_months.map_or(1.0, |m| m.min(12) as f64 / 12.0);
        self.base_amount(procedure) * fraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_knee_surgery_scaled_by_duration() {
        let tariff = Tariff::default();
        assert_eq!(tariff.estimate("knee surgery", Some(3)), 1_250.0);
        assert_eq!(tariff.estimate("Knee Surgery", Some(12)), 5_000.0);
        assert_eq!(tariff.estimate("knee surgery", Some(36)), 5_000.0);
    }

    #[test]
    fn test_unknown_duration_uses_full_base_amount() {
        let tariff = Tariff::default();
        assert_eq!(tariff.estimate("knee surgery", None), 5_000.0);
        assert_eq!(tariff.estimate("dental cleaning", None), 1_000.0);
    }

    #[test]
    fn test_unknown_procedure_uses_default() {
        let tariff = Tariff::default();
        assert_eq!(tariff.base_amount("dental cleaning"), 1_000.0);
        assert_eq!(tariff.base_amount(""), 1_000.0);
        assert_eq!(tariff.base_amount("right hip replacement"), 15_000.0);
    }
}

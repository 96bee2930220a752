//! Pure data-driven risk scoring: `entity_counts` + exposure level -> a
//! clamped 0-100 score and a risk tier. No I/O, no tenant awareness — the
//! caller supplies the inputs and persists the result.

use openlabels_core::types::ExposureLevel;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

trait ExposureMultiplier {
    fn multiplier(self) -> f64;
}

impl ExposureMultiplier for ExposureLevel {
    fn multiplier(self) -> f64 {
        match self {
            ExposureLevel::Private => 1.0,
            ExposureLevel::Internal => 1.1,
            ExposureLevel::OrgWide => 1.5,
            ExposureLevel::Public => 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Minimal,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=10 => RiskTier::Minimal,
            11..=25 => RiskTier::Low,
            26..=50 => RiskTier::Medium,
            51..=80 => RiskTier::High,
            _ => RiskTier::Critical,
        }
    }
}

/// A co-occurrence rule: when every entity type in `types` is present with a
/// nonzero count, the combined weighted sum is boosted by `multiplier`.
struct CoOccurrenceRule {
    types: &'static [&'static str],
    multiplier: f64,
}

fn entity_weight(entity_type: &str) -> f64 {
    match entity_type {
        "SSN" => 26.0,
        "CREDIT_CARD" => 22.0,
        "BANK_ACCOUNT" => 20.0,
        "PASSPORT" => 18.0,
        "DRIVER_LICENSE" => 15.0,
        "NPI" => 15.0,
        "DIAGNOSIS" => 18.0,
        "MEDICATION" => 12.0,
        "DOB" => 8.0,
        "NAME" => 4.0,
        "EMAIL" => 3.0,
        "PHONE" => 3.0,
        "ADDRESS" => 5.0,
        "IP_ADDRESS" => 2.0,
        "API_KEY" => 20.0,
        "PASSWORD" => 20.0,
        _ => 1.0,
    }
}

const CO_OCCURRENCE_RULES: &[CoOccurrenceRule] = &[
    CoOccurrenceRule {
        types: &["NAME", "SSN", "DOB"],
        multiplier: 1.5,
    },
    CoOccurrenceRule {
        types: &["NAME", "CREDIT_CARD"],
        multiplier: 1.3,
    },
    CoOccurrenceRule {
        types: &["NAME", "DIAGNOSIS"],
        multiplier: 1.4,
    },
    CoOccurrenceRule {
        types: &["API_KEY", "PASSWORD"],
        multiplier: 1.3,
    },
];

/// Scores a set of detected entity counts under a given exposure level.
///
/// `sum(weight(type) * count)` is computed first, boosted by every
/// co-occurrence rule whose full type set is present, multiplied by the
/// exposure multiplier, then clamped to `[0, 100]`.
pub fn score(entity_counts: &HashMap<String, u32>, exposure: ExposureLevel) -> u8 {
    if entity_counts.is_empty() {
        return 0;
    }

    let base: f64 = entity_counts
        .iter()
        .map(|(entity_type, count)| entity_weight(entity_type) * (*count as f64))
        .sum();

    let co_occurrence_multiplier = CO_OCCURRENCE_RULES
        .iter()
        .filter(|rule| {
            rule.types
                .iter()
                .all(|t| entity_counts.get(*t).copied().unwrap_or(0) > 0)
        })
        .map(|rule| rule.multiplier)
        .fold(1.0, |acc, m| acc * m);

    let raw = base * co_occurrence_multiplier * exposure.multiplier();
    raw.clamp(0.0, 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_counts_score_zero_and_tier_minimal() {
        let counts = HashMap::new();
        let s = score(&counts, ExposureLevel::Public);
        assert_eq!(s, 0);
        assert_eq!(RiskTier::from_score(s), RiskTier::Minimal);
    }

    #[test]
    fn two_ssns_alone_reach_high_even_at_private_exposure() {
        let mut counts = HashMap::new();
        counts.insert("SSN".to_string(), 2);
        let s = score(&counts, ExposureLevel::Private);
        assert!(s >= 51, "expected HIGH or CRITICAL, got {s}");
        assert_eq!(RiskTier::from_score(s), RiskTier::High);
    }

    #[test]
    fn ssn_dob_name_combo_reaches_high_or_above() {
        let mut counts = HashMap::new();
        counts.insert("NAME".to_string(), 2);
        counts.insert("SSN".to_string(), 2);
        counts.insert("DOB".to_string(), 1);
        let s = score(&counts, ExposureLevel::Internal);
        assert!(s >= 51, "expected HIGH or CRITICAL, got {s}");
        assert!(matches!(
            RiskTier::from_score(s),
            RiskTier::High | RiskTier::Critical
        ));
    }

    #[test]
    fn public_exposure_scores_higher_than_private_for_same_entities() {
        let mut counts = HashMap::new();
        counts.insert("EMAIL".to_string(), 3);
        let private = score(&counts, ExposureLevel::Private);
        let public = score(&counts, ExposureLevel::Public);
        assert!(public >= private);
    }

    #[test]
    fn score_never_exceeds_one_hundred() {
        let mut counts = HashMap::new();
        counts.insert("SSN".to_string(), 500);
        counts.insert("CREDIT_CARD".to_string(), 500);
        let s = score(&counts, ExposureLevel::Public);
        assert!(s <= 100);
    }

    #[test]
    fn tier_boundaries_match_the_documented_thresholds() {
        assert_eq!(RiskTier::from_score(10), RiskTier::Minimal);
        assert_eq!(RiskTier::from_score(11), RiskTier::Low);
        assert_eq!(RiskTier::from_score(25), RiskTier::Low);
        assert_eq!(RiskTier::from_score(26), RiskTier::Medium);
        assert_eq!(RiskTier::from_score(50), RiskTier::Medium);
        assert_eq!(RiskTier::from_score(51), RiskTier::High);
        assert_eq!(RiskTier::from_score(80), RiskTier::High);
        assert_eq!(RiskTier::from_score(81), RiskTier::Critical);
        assert_eq!(RiskTier::from_score(100), RiskTier::Critical);
    }
}

//! Tenant-scoped policy evaluation: pure rule matching against detection
//! output, no I/O. Downstream action dispatch (remediation, notification)
//! consumes the `PolicyResult` this produces but lives outside this crate.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityObservation {
    pub count: u32,
    pub max_confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    /// entity_type -> minimum count required for that type to count as present
    pub required: HashMap<String, u32>,
    pub min_confidence: f64,
    /// if the *only* detected type is one of these, the trigger never fires
    pub exclude_if_only: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub name: String,
    pub framework: String,
    pub risk_level: String,
    pub enabled: bool,
    pub triggers: Vec<Trigger>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyMatch {
    pub policy_id: String,
    pub policy_name: String,
    pub framework: String,
    pub severity: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyResult {
    pub matched: Vec<PolicyMatch>,
}

impl PolicyResult {
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }
}

fn trigger_fires(trigger: &Trigger, observations: &HashMap<String, EntityObservation>) -> bool {
    let all_required_present = trigger.required.iter().all(|(entity_type, min_count)| {
        observations
            .get(entity_type)
            .is_some_and(|obs| obs.count >= *min_count && obs.max_confidence >= trigger.min_confidence)
    });

    if !all_required_present {
        return false;
    }

    let detected_types: Vec<&str> = observations
        .iter()
        .filter(|(_, obs)| obs.count > 0)
        .map(|(t, _)| t.as_str())
        .collect();

    if detected_types.len() == 1 {
        let only_type = detected_types[0];
        if trigger.exclude_if_only.iter().any(|t| t == only_type) {
            return false;
        }
    }

    true
}

/// Evaluates every enabled policy's triggers against a set of entity
/// observations. A policy matches if *any* of its triggers fires.
pub fn evaluate(
    policies: &[Policy],
    observations: &HashMap<String, EntityObservation>,
) -> PolicyResult {
    let matched = policies
        .iter()
        .filter(|p| p.enabled)
        .filter(|p| p.triggers.iter().any(|t| trigger_fires(t, observations)))
        .map(|p| PolicyMatch {
            policy_id: p.id.clone(),
            policy_name: p.name.clone(),
            framework: p.framework.clone(),
            severity: p.risk_level.clone(),
        })
        .collect();

    PolicyResult { matched }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(count: u32, confidence: f64) -> EntityObservation {
        EntityObservation {
            count,
            max_confidence: confidence,
        }
    }

    fn hipaa_like_policy() -> Policy {
        let mut required = HashMap::new();
        required.insert("NAME".to_string(), 1);
        required.insert("DIAGNOSIS".to_string(), 1);

        Policy {
            id: "pol-1".to_string(),
            name: "HIPAA PHI exposure".to_string(),
            framework: "HIPAA".to_string(),
            risk_level: "high".to_string(),
            enabled: true,
            triggers: vec![Trigger {
                required,
                min_confidence: 0.7,
                exclude_if_only: vec!["NAME".to_string()],
            }],
        }
    }

    #[test]
    fn trigger_fires_when_all_required_types_present_with_sufficient_confidence() {
        let policy = hipaa_like_policy();
        let mut observations = HashMap::new();
        observations.insert("NAME".to_string(), obs(2, 0.9));
        observations.insert("DIAGNOSIS".to_string(), obs(1, 0.8));

        let result = evaluate(&[policy], &observations);
        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.matched[0].framework, "HIPAA");
    }

    #[test]
    fn trigger_does_not_fire_below_min_confidence() {
        let policy = hipaa_like_policy();
        let mut observations = HashMap::new();
        observations.insert("NAME".to_string(), obs(2, 0.9));
        observations.insert("DIAGNOSIS".to_string(), obs(1, 0.5));

        let result = evaluate(&[policy], &observations);
        assert!(result.is_empty());
    }

    #[test]
    fn exclude_if_only_suppresses_sole_matching_type() {
        let policy = hipaa_like_policy();
        let mut observations = HashMap::new();
        observations.insert("NAME".to_string(), obs(1, 0.95));

        let result = evaluate(&[policy], &observations);
        assert!(result.is_empty());
    }

    #[test]
    fn disabled_policy_never_matches() {
        let mut policy = hipaa_like_policy();
        policy.enabled = false;
        let mut observations = HashMap::new();
        observations.insert("NAME".to_string(), obs(2, 0.9));
        observations.insert("DIAGNOSIS".to_string(), obs(1, 0.8));

        let result = evaluate(&[policy], &observations);
        assert!(result.is_empty());
    }
}

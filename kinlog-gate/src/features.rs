//! Feature extraction: the bounded-real feature vector `x` salience scoring
//! consumes, per spec §4.5 step 3.

use serde::{Deserialize, Serialize};

use crate::request::FeatureOverrides;

/// `x = (urgency, novelty, value, risk, affect_arousal, cost, social_risk)`.
/// Every field is in `[0, 1]`; this is also the `feature_snapshot` recorded
/// on the audit trace, so it carries only derived scalars, never raw text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub urgency: f64,
    pub novelty: f64,
    pub value: f64,
    pub risk: f64,
    pub affect_arousal: f64,
    pub cost: f64,
    pub social_risk: f64,
}

impl FeatureVector {
    pub fn as_array(&self) -> [f64; 7] {
        [
            self.urgency,
            self.novelty,
            self.value,
            self.risk,
            self.affect_arousal,
            self.cost,
            self.social_risk,
        ]
    }
}

/// Fallback value used for a feature the caller didn't supply, plus the
/// flat penalty subtracted from a weight's contribution to the raw score
/// when it falls back, per "missing inputs degrade to configured defaults
/// with penalty applied." `risk`/`cost`/`social_risk` default high (caution
/// under uncertainty); the rest default to a neutral midpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureDefaults {
    pub urgency: f64,
    pub novelty: f64,
    pub value: f64,
    pub risk: f64,
    pub affect_arousal: f64,
    pub cost: f64,
    pub social_risk: f64,
    pub missing_penalty: f64,
}

impl Default for FeatureDefaults {
    fn default() -> Self {
        Self {
            urgency: 0.3,
            novelty: 0.3,
            value: 0.3,
            risk: 0.4,
            affect_arousal: 0.3,
            cost: 0.4,
            social_risk: 0.3,
            missing_penalty: 0.1,
        }
    }
}

/// A lightweight lexical heuristic used when a feature isn't supplied by the
/// caller: counts of punctuation/length signal urgency and novelty without
/// running a full classifier. Bounded to `[0, 1]` via a saturating ramp.
fn lexical_urgency(text: &str) -> f64 {
    let bangs = text.chars().filter(|c| *c == '!').count() as f64;
    let upper_words = text.split_whitespace().filter(|w| w.len() > 2 && w.chars().all(|c| c.is_uppercase())).count() as f64;
    (0.15 * bangs + 0.1 * upper_words).min(1.0)
}

fn lexical_novelty(text: &str) -> f64 {
    // Longer, more specific requests skew novel relative to a short routine
    // note; this is a coarse proxy, not a dedup/embedding lookup.
    (text.split_whitespace().count() as f64 / 40.0).min(1.0)
}

/// Compute the feature vector for `text`, filling in any field not present
/// in `overrides` from `defaults` with `missing_penalty` applied (the
/// default degrades the feature value toward 0 contribution by that much).
pub fn extract(text: &str, overrides: &FeatureOverrides, defaults: &FeatureDefaults) -> FeatureVector {
    let degrade = |v: f64| (v - defaults.missing_penalty).max(0.0);

    FeatureVector {
        urgency: overrides
            .urgency
            .unwrap_or_else(|| degrade(lexical_urgency(text).max(defaults.urgency))),
        novelty: overrides
            .novelty
            .unwrap_or_else(|| degrade(lexical_novelty(text).max(defaults.novelty))),
        value: overrides.value.unwrap_or_else(|| degrade(defaults.value)),
        risk: overrides.risk.unwrap_or_else(|| degrade(defaults.risk)),
        affect_arousal: overrides
            .affect_arousal
            .unwrap_or_else(|| degrade(defaults.affect_arousal)),
        cost: overrides.cost.unwrap_or_else(|| degrade(defaults.cost)),
        social_risk: overrides
            .social_risk
            .unwrap_or_else(|| degrade(defaults.social_risk)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_take_priority_over_lexical_defaults() {
        let overrides = FeatureOverrides {
            urgency: Some(0.9),
            ..Default::default()
        };
        let fv = extract("quiet note", &overrides, &FeatureDefaults::default());
        assert_eq!(fv.urgency, 0.9);
    }

    #[test]
    fn missing_fields_degrade_by_the_configured_penalty() {
        let defaults = FeatureDefaults::default();
        let fv = extract("", &FeatureOverrides::default(), &defaults);
        assert!((fv.value - (defaults.value - defaults.missing_penalty)).abs() < 1e-9);
    }

    #[test]
    fn all_features_stay_within_unit_interval() {
        let fv = extract(
            "HELP!!! this is extremely urgent and important right now!!!",
            &FeatureOverrides::default(),
            &FeatureDefaults::default(),
        );
        for v in fv.as_array() {
            assert!((0.0..=1.0).contains(&v));
        }
    }
}

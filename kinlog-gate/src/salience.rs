//! Salience scoring and priority calibration, spec §4.5 step 4.

use kinlog_core::config::{ScoringConstants, SalienceWeights};

use crate::features::FeatureVector;

/// Raw score `S = w·x + b`, with `risk`, `cost`, and `social_risk`
/// subtracted rather than added (the sign convention spec §4.5 calls out
/// explicitly; every other feature contributes positively).
pub fn raw_score(weights: &SalienceWeights, x: &FeatureVector, bias: f64) -> f64 {
    weights.urgency * x.urgency
        + weights.novelty * x.novelty
        + weights.value * x.value
        + weights.affect_arousal * x.affect_arousal
        - weights.risk * x.risk
        - weights.cost * x.cost
        - weights.social_risk * x.social_risk
        + bias
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Calibrated priority: `sigmoid(alpha * S + beta * context_bump)`.
pub fn priority(scoring: &ScoringConstants, raw: f64, context_bump: f64) -> f64 {
    sigmoid(scoring.alpha * raw + scoring.beta * context_bump)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights() -> SalienceWeights {
        SalienceWeights {
            urgency: 0.2,
            novelty: 0.15,
            value: 0.2,
            risk: 0.25,
            affect_arousal: 0.1,
            cost: 0.05,
            social_risk: 0.05,
        }
    }

    fn features(risk: f64) -> FeatureVector {
        FeatureVector {
            urgency: 0.5,
            novelty: 0.5,
            value: 0.5,
            risk,
            affect_arousal: 0.5,
            cost: 0.2,
            social_risk: 0.1,
        }
    }

    #[test]
    fn higher_risk_lowers_the_raw_score() {
        let low = raw_score(&weights(), &features(0.1), 0.0);
        let high = raw_score(&weights(), &features(0.9), 0.0);
        assert!(high < low);
    }

    #[test]
    fn priority_is_bounded_to_unit_interval() {
        let scoring = ScoringConstants { alpha: 1.0, beta: 0.3, bias: 0.0 };
        for raw in [-10.0, -1.0, 0.0, 1.0, 10.0] {
            let p = priority(&scoring, raw, 0.0);
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn zero_raw_score_and_bump_yields_midpoint_priority() {
        let scoring = ScoringConstants { alpha: 1.0, beta: 0.3, bias: 0.0 };
        let p = priority(&scoring, 0.0, 0.0);
        assert!((p - 0.5).abs() < 1e-9);
    }

    #[test]
    fn positive_context_bump_raises_priority() {
        let scoring = ScoringConstants { alpha: 1.0, beta: 0.3, bias: 0.0 };
        let base = priority(&scoring, 0.0, 0.0);
        let bumped = priority(&scoring, 0.0, 1.0);
        assert!(bumped > base);
    }
}

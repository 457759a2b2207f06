//! Master configuration for the event fabric. All values are required in
//! the on-disk `toml` form; [`FabricConfig::default_local`] exists so tests
//! and a first-run binary don't need to hand-author a full file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::envelope::Band;
use crate::error::ConfigError;

/// `bus.*` options: WAL root, fsync policy, and per-topic retention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusConfig {
    pub root_path: String,
    /// `always`, `interval_ms`, or `never` collapse to this: `None` means
    /// fsync on every append, `Some(ms)` batches fsync on that interval.
    pub fsync_interval_ms: Option<u64>,
    pub segment_rotation_bytes: u64,
    pub default_retention: RetentionConfig,
    #[serde(default)]
    pub topic_retention_overrides: BTreeMap<String, RetentionConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionConfig {
    pub max_age_ms: Option<i64>,
    pub max_bytes: Option<u64>,
}

/// `gate.*` options: salience weights, cascade thresholds, backpressure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    pub weights: SalienceWeights,
    pub scoring: ScoringConstants,
    pub thresholds: CascadeThresholds,
    pub admit_intent_threshold: f64,
    pub token_bucket: TokenBucketConfig,
    pub breaker: CircuitBreakerConfig,
    /// Bands that fail the hard policy check outright, independent of
    /// priority. Empty by default: band-based projection limits are enforced
    /// downstream, not by rejecting ingestion at the gate.
    #[serde(default)]
    pub denied_bands: Vec<Band>,
}

/// Weights over the feature vector `x = (urgency, novelty, value, risk,
/// affect_arousal, cost, social_risk)`. `risk`, `cost`, and `social_risk`
/// are subtracted (their sign is folded in at score time, not here).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SalienceWeights {
    pub urgency: f64,
    pub novelty: f64,
    pub value: f64,
    pub risk: f64,
    pub affect_arousal: f64,
    pub cost: f64,
    pub social_risk: f64,
}

/// `priority = sigmoid(alpha * S + beta * context_bump)` where `S = w.x + b`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConstants {
    pub alpha: f64,
    pub beta: f64,
    pub bias: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CascadeThresholds {
    pub drop_threshold: f64,
    pub admit_threshold: f64,
    pub boost_threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenBucketConfig {
    pub capacity: f64,
    pub refill_per_sec: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub fail_window_ms: u64,
    pub fail_threshold: f64,
    pub half_open_after_ms: u64,
}

/// `episodic.*` options: segmentation weights and temporal decay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodicConfig {
    pub db_path: String,
    pub map_size_bytes: usize,
    pub segmentation: SegmentationConfig,
    pub half_life_ms: i64,
}

/// Boundary-score weights for `B_t = sigmoid(alpha*G_t + beta*S_t +
/// gamma*A_t + delta*H_t - eta*micro_session(t))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    pub tau_t_ms: i64,
    pub window: usize,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub delta: f64,
    pub eta: f64,
    pub soft_cut_threshold: f64,
    pub hard_cut_ms: i64,
}

/// A single phrase-to-duration mapping entry for the episodic store's
/// natural-language recency queries ("this morning", "last week").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseTimeMapping {
    pub phrase: String,
    pub lookback_ms: i64,
}

/// Root configuration object, deserialized from a single `toml` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FabricConfig {
    pub bus: BusConfig,
    pub gate: GateConfig,
    pub episodic: EpisodicConfig,
    #[serde(default)]
    pub phrase_time_mappings: Vec<PhraseTimeMapping>,
}

impl FabricConfig {
    /// A complete, sane configuration for local single-device use, so tests
    /// and a first-run binary are never forced to hand-author a full file.
    pub fn default_local(root_path: impl Into<String>) -> Self {
        let root_path = root_path.into();
        Self {
            bus: BusConfig {
                root_path: format!("{root_path}/wal"),
                fsync_interval_ms: Some(50),
                segment_rotation_bytes: 64 * 1024 * 1024,
                default_retention: RetentionConfig {
                    max_age_ms: Some(30 * 24 * 60 * 60 * 1000),
                    max_bytes: None,
                },
                topic_retention_overrides: BTreeMap::new(),
            },
            gate: GateConfig {
                weights: SalienceWeights {
                    urgency: 0.28,
                    novelty: 0.21,
                    value: 0.28,
                    risk: 0.25,
                    affect_arousal: 0.14,
                    cost: 0.05,
                    social_risk: 0.05,
                },
                scoring: ScoringConstants {
                    alpha: 1.0,
                    beta: 0.3,
                    bias: 0.24,
                },
                thresholds: CascadeThresholds {
                    drop_threshold: 0.20,
                    admit_threshold: 0.55,
                    boost_threshold: 0.75,
                },
                admit_intent_threshold: 0.5,
                token_bucket: TokenBucketConfig {
                    capacity: 5.0,
                    refill_per_sec: 2.0,
                },
                breaker: CircuitBreakerConfig {
                    fail_window_ms: 30_000,
                    fail_threshold: 0.25,
                    half_open_after_ms: 15_000,
                },
                denied_bands: Vec::new(),
            },
            episodic: EpisodicConfig {
                db_path: format!("{root_path}/episodic.mdb"),
                map_size_bytes: 1024 * 1024 * 1024,
                segmentation: SegmentationConfig {
                    tau_t_ms: 600_000,
                    window: 32,
                    alpha: 0.7,
                    beta: 0.9,
                    gamma: 0.4,
                    delta: 0.3,
                    eta: 0.2,
                    soft_cut_threshold: 0.6,
                    hard_cut_ms: 7_200_000,
                },
                half_life_ms: 259_200_000,
            },
            phrase_time_mappings: default_phrase_time_mappings(),
        }
    }

    /// Parse a configuration document from `toml` text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::InvalidValue {
            field: "<document>".to_string(),
            value: String::new(),
            reason: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bus.root_path.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "bus.root_path".to_string(),
            });
        }
        if self.bus.segment_rotation_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "bus.segment_rotation_bytes".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        let t = &self.gate.thresholds;
        if !(0.0..=1.0).contains(&t.drop_threshold)
            || !(t.drop_threshold..=1.0).contains(&t.admit_threshold)
            || !(t.admit_threshold..=1.0).contains(&t.boost_threshold)
        {
            return Err(ConfigError::InvalidValue {
                field: "gate.thresholds".to_string(),
                value: format!("{:?}", t),
                reason: "must satisfy 0 <= drop_threshold <= admit_threshold <= boost_threshold <= 1"
                    .to_string(),
            });
        }
        if self.gate.breaker.fail_threshold < 0.0 || self.gate.breaker.fail_threshold > 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "gate.breaker.fail_threshold".to_string(),
                value: self.gate.breaker.fail_threshold.to_string(),
                reason: "must be in [0, 1]".to_string(),
            });
        }
        if self.episodic.half_life_ms <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "episodic.half_life_ms".to_string(),
                value: self.episodic.half_life_ms.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

fn default_phrase_time_mappings() -> Vec<PhraseTimeMapping> {
    const HOUR: i64 = 60 * 60 * 1000;
    vec![
        PhraseTimeMapping {
            phrase: "this morning".to_string(),
            lookback_ms: 12 * HOUR,
        },
        PhraseTimeMapping {
            phrase: "today".to_string(),
            lookback_ms: 24 * HOUR,
        },
        PhraseTimeMapping {
            phrase: "yesterday".to_string(),
            lookback_ms: 48 * HOUR,
        },
        PhraseTimeMapping {
            phrase: "this week".to_string(),
            lookback_ms: 7 * 24 * HOUR,
        },
        PhraseTimeMapping {
            phrase: "last week".to_string(),
            lookback_ms: 14 * 24 * HOUR,
        },
        PhraseTimeMapping {
            phrase: "this month".to_string(),
            lookback_ms: 30 * 24 * HOUR,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_local_config_validates() {
        let cfg = FabricConfig::default_local("/tmp/kinlog");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn round_trips_through_toml() {
        let cfg = FabricConfig::default_local("/tmp/kinlog");
        let text = toml::to_string(&cfg).unwrap();
        let parsed = FabricConfig::from_toml(&text).unwrap();
        assert_eq!(cfg, parsed);
    }

    #[test]
    fn rejects_out_of_order_thresholds() {
        let mut cfg = FabricConfig::default_local("/tmp/kinlog");
        cfg.gate.thresholds.drop_threshold = 0.9;
        cfg.gate.thresholds.admit_threshold = 0.1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn default_phrase_mappings_are_monotonically_increasing_with_scope() {
        let mappings = default_phrase_time_mappings();
        assert!(mappings.iter().find(|m| m.phrase == "today").unwrap().lookback_ms
            < mappings.iter().find(|m| m.phrase == "this week").unwrap().lookback_ms);
    }
}

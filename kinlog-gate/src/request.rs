//! The `Request` submitted to the Attention Gate and the partial feature
//! overrides a producer may attach to skip default-penalty degradation.

use kinlog_core::envelope::{Actor, Band, Obligation};
use kinlog_core::ids::{EntityIdType, RequestId, SpaceId, TraceId};

/// Producer-supplied overrides for one or more dimensions of the feature
/// vector. Any field left `None` falls back to
/// [`crate::features::FeatureDefaults`] with a penalty applied, per spec
/// §4.5 step 3 ("missing inputs degrade to configured defaults with penalty
/// applied").
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FeatureOverrides {
    pub urgency: Option<f64>,
    pub novelty: Option<f64>,
    pub value: Option<f64>,
    pub risk: Option<f64>,
    pub affect_arousal: Option<f64>,
    pub cost: Option<f64>,
    pub social_risk: Option<f64>,
}

/// A request entering the gate. `declared_intent` lets an upstream caller
/// assert an intent directly (still checked against the closed vocabulary);
/// when absent, intent derivation runs the rule grammar against `text`.
#[derive(Debug, Clone)]
pub struct Request {
    pub request_id: RequestId,
    pub space_id: SpaceId,
    pub actor: Actor,
    pub band: Band,
    pub trace_id: TraceId,
    pub ts: i64,
    pub text: String,
    pub declared_intent: Option<String>,
    pub obligations: Vec<Obligation>,
    pub policy_version: String,
    pub mls_group: Option<String>,
    pub ttl_ms: Option<i64>,
    /// `context_bump` term in the priority calibration, e.g. a caller-scored
    /// recency or thread-continuation boost in `[-1, 1]`. Defaults to 0.
    pub context_bump: f64,
    pub feature_overrides: FeatureOverrides,
}

impl Request {
    pub fn new(
        space_id: SpaceId,
        actor: Actor,
        band: Band,
        trace_id: TraceId,
        ts: i64,
        text: impl Into<String>,
    ) -> Self {
        Self {
            request_id: RequestId::now_v7(),
            space_id,
            actor,
            band,
            trace_id,
            ts,
            text: text.into(),
            declared_intent: None,
            obligations: Vec::new(),
            policy_version: "v1".to_string(),
            mls_group: None,
            ttl_ms: None,
            context_bump: 0.0,
            feature_overrides: FeatureOverrides::default(),
        }
    }
}

//! `AttentionGate`: the synchronous pre-bus admission controller, spec §4.5.

use std::collections::HashMap;
use std::sync::Mutex;

use kinlog_core::backpressure::{CircuitBreaker, TokenBucket};
use kinlog_core::config::{CascadeThresholds, GateConfig};
use kinlog_core::envelope::{Actor, Band, Event, EventMeta, EventType, Hashes, Obligation, Qos};
use kinlog_core::ids::{EntityIdType, EventId, RequestId, TraceId};

use crate::features::{self, FeatureDefaults, FeatureVector};
use crate::intents::{self, DerivedIntent};
use crate::request::Request;
use crate::salience;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Admit,
    Boost,
    Defer,
    Drop,
}

/// `{request_id, action, priority, reasons, derived_intents, obligations,
/// ttl_ms, feature_snapshot, thresholds, ts}`, spec §3.5. Doubles as the
/// payload of the `gate.decisions.audit` / `GATE_DECISION` trace: it never
/// carries raw request text, only derived scalars and obligation strings.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GateDecision {
    pub request_id: RequestId,
    pub action: Action,
    pub priority: f64,
    pub reasons: Vec<String>,
    pub derived_intents: Vec<DerivedIntent>,
    pub obligations: Vec<String>,
    pub ttl_ms: Option<i64>,
    pub feature_snapshot: FeatureVector,
    pub thresholds: CascadeThresholds,
    pub ts: i64,
}

/// The gate's full output: the decision (always produced, always auditable)
/// plus zero or more events to publish on ADMIT/BOOST.
pub struct GateOutcome {
    pub decision: GateDecision,
    pub events: Vec<Event>,
}

#[derive(Hash, Eq, PartialEq, Clone)]
struct ActorSpaceKey {
    actor: uuid::Uuid,
    space: uuid::Uuid,
}

/// Owns the gate's per-(actor, space) token buckets and per-topic circuit
/// breakers, since those are the only pieces of state the cascade carries
/// across calls; everything else in `decide` is pure given this state.
pub struct AttentionGate {
    config: GateConfig,
    defaults: FeatureDefaults,
    buckets: Mutex<HashMap<ActorSpaceKey, TokenBucket>>,
    breakers: Mutex<HashMap<String, CircuitBreaker>>,
}

impl AttentionGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            defaults: FeatureDefaults::default(),
            buckets: Mutex::new(HashMap::new()),
            breakers: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_feature_defaults(mut self, defaults: FeatureDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    fn bucket_take(&self, request: &Request) -> bool {
        let key = ActorSpaceKey {
            actor: request.actor.person_id.as_uuid(),
            space: request.space_id.as_uuid(),
        };
        let mut guard = self.buckets.lock().expect("token bucket map poisoned");
        let bucket = guard
            .entry(key)
            .or_insert_with(|| TokenBucket::new(self.config.token_bucket));
        bucket.try_take(1.0)
    }

    fn breaker_allows(&self, topic: &str) -> bool {
        let mut guard = self.breakers.lock().expect("breaker map poisoned");
        let breaker = guard
            .entry(topic.to_string())
            .or_insert_with(|| CircuitBreaker::new(self.config.breaker));
        breaker.is_allowed()
    }

    /// Record the outcome of actually publishing an admitted/boosted event,
    /// so the breaker for that topic reflects downstream health. Callers on
    /// the publish side (the bus) are expected to report back through this.
    pub fn record_publish_outcome(&self, topic: &str, ok: bool) {
        let mut guard = self.breakers.lock().expect("breaker map poisoned");
        let breaker = guard
            .entry(topic.to_string())
            .or_insert_with(|| CircuitBreaker::new(self.config.breaker));
        if ok {
            breaker.record_success();
        } else {
            breaker.record_failure();
        }
    }

    /// Roll up gate health from its per-topic circuit breakers: any open
    /// breaker makes the gate degraded (it is still admitting requests for
    /// other topics), since an open breaker means a downstream topic has
    /// been failing its publish/subscribe round trip.
    pub fn health(&self) -> kinlog_core::health::HealthCheck {
        use kinlog_core::backpressure::CircuitState;
        use kinlog_core::health::HealthCheck;
        let guard = self.breakers.lock().expect("breaker map poisoned");
        let open: Vec<&str> = guard
            .iter()
            .filter(|(_, b)| b.state() == CircuitState::Open)
            .map(|(topic, _)| topic.as_str())
            .collect();
        if open.is_empty() {
            HealthCheck::healthy("attention_gate")
        } else {
            HealthCheck::degraded("attention_gate", format!("breaker open for: {}", open.join(", ")))
        }
    }

    /// Run the full cascade for `request`, producing a decision and any
    /// events to publish. Synchronous: no I/O, no bus access, per spec
    /// §4.5's "synchronous pre-bus admission controller."
    pub fn decide(&self, request: &Request) -> GateOutcome {
        let thresholds = self.config.thresholds;

        // 1. Hard policy check.
        if self.config.denied_bands.contains(&request.band) {
            return self.terminal(request, Action::Drop, 0.0, vec!["policy_band".to_string()], vec![], None);
        }
        if let Err(_e) = hard_envelope_check(request) {
            return self.terminal(request, Action::Drop, 0.0, vec!["schema_invalid".to_string()], vec![], None);
        }

        // 2. Intent derivation.
        let derived_intents = intents::resolve_intents(request.declared_intent.as_deref(), &request.text);

        // 3. Feature extraction.
        let feature_snapshot = features::extract(&request.text, &request.feature_overrides, &self.defaults);

        // 4. Salience scoring.
        let raw = salience::raw_score(&self.config.weights, &feature_snapshot, self.config.scoring.bias);
        let mut priority = salience::priority(&self.config.scoring, raw, request.context_bump);

        // 5. Backpressure check.
        if !self.bucket_take(request) {
            return self.decision_only(
                request,
                Action::Defer,
                priority,
                vec!["rate_limited".to_string()],
                derived_intents,
                feature_snapshot,
                Some(self.config.token_bucket.capacity.max(1.0) as i64 * 1000),
            );
        }
        let blocked_topic = derived_intents
            .iter()
            .map(|d| d.intent.topic())
            .find(|topic| !self.breaker_allows(topic));
        if let Some(_topic) = blocked_topic {
            return self.decision_only(
                request,
                Action::Defer,
                priority,
                vec!["downstream_unhealthy".to_string()],
                derived_intents,
                feature_snapshot,
                Some(5_000),
            );
        }

        // 6. Action selection.
        let (action, reasons, ttl_ms) = if priority < thresholds.drop_threshold {
            (Action::Drop, vec!["low_priority".to_string()], None)
        } else if priority < thresholds.admit_threshold {
            (Action::Defer, vec!["borderline".to_string()], request.ttl_ms.or(Some(60_000)))
        } else if priority < thresholds.boost_threshold {
            (Action::Admit, vec!["admitted".to_string()], None)
        } else {
            (Action::Boost, vec!["boosted".to_string()], None)
        };

        if action == Action::Boost {
            priority = (priority + 0.2).min(1.0);
        }

        let events = if matches!(action, Action::Admit | Action::Boost) {
            self.emit_events(request, &derived_intents, priority)
        } else {
            Vec::new()
        };

        let decision = self.build_decision(request, action, priority, reasons, derived_intents, feature_snapshot, ttl_ms);
        GateOutcome { decision, events }
    }

    fn emit_events(&self, request: &Request, derived_intents: &[DerivedIntent], priority: f64) -> Vec<Event> {
        derived_intents
            .iter()
            .filter(|d| d.confidence >= self.config.admit_intent_threshold)
            .map(|d| {
                let qos = Qos::new(priority);
                let meta = EventMeta {
                    event_id: EventId::generate(),
                    topic: d.intent.topic().to_string(),
                    event_type: EventType::new(d.intent.event_type()),
                    space_id: request.space_id,
                    ts: request.ts,
                    actor: Actor {
                        person_id: request.actor.person_id,
                        device_id: request.actor.device_id,
                        role: request.actor.role.clone(),
                    },
                    band: request.band,
                    obligations: request.obligations.clone(),
                    policy_version: request.policy_version.clone(),
                    qos,
                    hashes: Hashes { payload_sha256: [0u8; 32] },
                    signature: None,
                    trace_id: request.trace_id,
                    idempotency_key: None,
                    ttl_ms: request.ttl_ms,
                    mls_group: request.mls_group.clone(),
                };
                Event::new(meta, serde_json::json!({ "text": request.text })).with_computed_hash()
            })
            .collect()
    }

    fn build_decision(
        &self,
        request: &Request,
        action: Action,
        priority: f64,
        reasons: Vec<String>,
        derived_intents: Vec<DerivedIntent>,
        feature_snapshot: FeatureVector,
        ttl_ms: Option<i64>,
    ) -> GateDecision {
        GateDecision {
            request_id: request.request_id,
            action,
            priority: priority.clamp(0.0, 1.0),
            reasons,
            derived_intents,
            obligations: request.obligations.iter().map(Obligation::to_string).collect(),
            ttl_ms,
            feature_snapshot,
            thresholds: self.config.thresholds,
            ts: request.ts,
        }
    }

    fn decision_only(
        &self,
        request: &Request,
        action: Action,
        priority: f64,
        reasons: Vec<String>,
        derived_intents: Vec<DerivedIntent>,
        feature_snapshot: FeatureVector,
        ttl_ms: Option<i64>,
    ) -> GateOutcome {
        GateOutcome {
            decision: self.build_decision(request, action, priority, reasons, derived_intents, feature_snapshot, ttl_ms),
            events: Vec::new(),
        }
    }

    fn terminal(
        &self,
        request: &Request,
        action: Action,
        priority: f64,
        reasons: Vec<String>,
        derived_intents: Vec<DerivedIntent>,
        ttl_ms: Option<i64>,
    ) -> GateOutcome {
        let feature_snapshot = features::extract(&request.text, &request.feature_overrides, &self.defaults);
        GateOutcome {
            decision: self.build_decision(request, action, priority, reasons, derived_intents, feature_snapshot, ttl_ms),
            events: Vec::new(),
        }
    }
}

fn hard_envelope_check(request: &Request) -> Result<(), kinlog_core::error::EnvelopeError> {
    if request.band.requires_mls_group() && request.mls_group.as_deref().unwrap_or("").is_empty() {
        return Err(kinlog_core::error::EnvelopeError::MissingMlsGroup { band: request.band });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinlog_core::ids::{ActorDeviceId, ActorPersonId, SpaceId};

    fn gate() -> AttentionGate {
        AttentionGate::new(kinlog_core::config::FabricConfig::default_local("/tmp/kinlog").gate)
    }

    fn request(text: &str) -> Request {
        Request::new(
            SpaceId::now_v7(),
            Actor::new(ActorPersonId::now_v7(), ActorDeviceId::now_v7()),
            Band::Green,
            TraceId::now_v7(),
            0,
            text,
        )
    }

    #[test]
    fn default_intent_text_is_admitted_with_a_mid_range_priority() {
        let g = gate();
        let req = request("Grocery list: apples, milk");
        let out = g.decide(&req);
        assert_eq!(out.decision.action, Action::Admit);
        assert!(out.decision.priority > 0.2 && out.decision.priority < 0.8);
        assert!(!out.events.is_empty());
    }

    #[test]
    fn amber_without_mls_group_is_dropped_on_hard_policy_check() {
        let g = gate();
        let mut req = request("anything");
        req.band = Band::Amber;
        let out = g.decide(&req);
        assert_eq!(out.decision.action, Action::Drop);
        assert_eq!(out.decision.reasons, vec!["schema_invalid".to_string()]);
        assert!(out.events.is_empty());
    }

    #[test]
    fn denied_band_is_dropped_before_any_scoring() {
        let mut config = kinlog_core::config::FabricConfig::default_local("/tmp/kinlog").gate;
        config.denied_bands = vec![Band::Red];
        let g = AttentionGate::new(config);
        let mut req = request("anything");
        req.band = Band::Red;
        req.mls_group = Some("g1".to_string());
        let out = g.decide(&req);
        assert_eq!(out.decision.action, Action::Drop);
        assert_eq!(out.decision.reasons, vec!["policy_band".to_string()]);
    }

    #[test]
    fn high_urgency_override_can_trigger_boost() {
        let g = gate();
        let mut req = request("URGENT");
        req.feature_overrides = crate::request::FeatureOverrides {
            urgency: Some(1.0),
            novelty: Some(1.0),
            value: Some(1.0),
            risk: Some(0.0),
            affect_arousal: Some(1.0),
            cost: Some(0.0),
            social_risk: Some(0.0),
        };
        let out = g.decide(&req);
        assert_eq!(out.decision.action, Action::Boost);
        assert!(out.decision.priority >= g.config.thresholds.boost_threshold);
    }

    #[test]
    fn rate_limited_request_defers() {
        let mut config = kinlog_core::config::FabricConfig::default_local("/tmp/kinlog").gate;
        config.token_bucket.capacity = 1.0;
        config.token_bucket.refill_per_sec = 0.0;
        let g = AttentionGate::new(config);
        let req = request("note: first");
        let first = g.decide(&req);
        assert_ne!(first.decision.reasons, vec!["rate_limited".to_string()]);
        let second = g.decide(&req);
        assert_eq!(second.decision.action, Action::Defer);
        assert_eq!(second.decision.reasons, vec!["rate_limited".to_string()]);
    }

    #[test]
    fn audit_trace_never_contains_raw_request_text() {
        let g = gate();
        let req = request("super secret grocery list");
        let out = g.decide(&req);
        let json = serde_json::to_string(&out.decision).unwrap();
        assert!(!json.contains("super secret grocery list"));
    }

    #[test]
    fn health_is_healthy_with_no_open_breakers() {
        let g = gate();
        assert_eq!(g.health().status, kinlog_core::health::HealthStatus::Healthy);
    }

    #[test]
    fn health_degrades_once_a_topic_breaker_opens() {
        let g = gate();
        g.record_publish_outcome("hippo.encode", false);
        assert_eq!(g.health().status, kinlog_core::health::HealthStatus::Degraded);
    }

    proptest::proptest! {
        #[test]
        fn feature_snapshot_is_always_unit_scalars_and_never_leaks_request_text(
            req in kinlog_test_utils::generators::request_strategy(),
        ) {
            let g = gate();
            let out = g.decide(&req);
            let snapshot = &out.decision.feature_snapshot;
            for v in [
                snapshot.urgency,
                snapshot.novelty,
                snapshot.value,
                snapshot.risk,
                snapshot.affect_arousal,
                snapshot.cost,
                snapshot.social_risk,
            ] {
                proptest::prop_assert!((0.0..=1.0).contains(&v));
            }
            let json = serde_json::to_string(&out.decision).unwrap();
            if req.text.len() > 3 {
                proptest::prop_assert!(!json.contains(req.text.as_str()));
            }
        }
    }
}

//! Builders for envelopes and requests so tests across crates don't each
//! hand-roll a full `EventMeta`/`Request`.

use kinlog_core::envelope::{Actor, Band, Event, EventMeta, EventType, Hashes, Obligation, Qos};
use kinlog_core::ids::{ActorDeviceId, ActorPersonId, EntityIdType, EventId, SpaceId, TraceId};

/// A `GREEN`-band event on the given topic with the given JSON payload,
/// hash computed, no signature, no TTL.
pub fn sample_event(space_id: SpaceId, topic: &str, payload: serde_json::Value) -> Event {
    sample_event_with_band(space_id, topic, payload, Band::Green, None)
}

pub fn sample_event_with_band(
    space_id: SpaceId,
    topic: &str,
    payload: serde_json::Value,
    band: Band,
    mls_group: Option<String>,
) -> Event {
    let meta = EventMeta {
        event_id: EventId::generate(),
        topic: topic.to_string(),
        event_type: EventType::new(topic.replace('.', "_").to_uppercase()),
        space_id,
        ts: 0,
        actor: Actor::new(ActorPersonId::now_v7(), ActorDeviceId::now_v7()),
        band,
        obligations: vec![],
        policy_version: "v1".to_string(),
        qos: Qos::new(0.5),
        hashes: Hashes { payload_sha256: [0u8; 32] },
        signature: None,
        trace_id: TraceId::now_v7(),
        idempotency_key: None,
        ttl_ms: None,
        mls_group,
    };
    Event::new(meta, payload).with_computed_hash()
}

pub fn sample_obligation(value: &str) -> Obligation {
    Obligation::new(value).expect("sample obligations are always well-formed")
}

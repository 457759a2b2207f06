//! The canonical event envelope: `EventMeta` plus a JSON payload.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ids::{ActorDeviceId, ActorPersonId, EventId, IdempotencyKey, SpaceId, TraceId};

static TOPIC_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_.-]{0,63}$").expect("static regex compiles"));

/// Risk classification of content/event. Ordered `GREEN < AMBER < RED < BLACK`.
///
/// Higher bands carry more obligations and fewer projection rights. `band`
/// is a frozen invariant: once an event carries a band it can never be
/// semantically weakened by any later hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Band {
    Green,
    Amber,
    Red,
    Black,
}

impl Band {
    /// `AMBER | RED | BLACK` events must carry a non-empty `mls_group` reference.
    pub fn requires_mls_group(&self) -> bool {
        !matches!(self, Band::Green)
    }
}

/// A single entry from the closed obligations vocabulary, e.g.
/// `mask:pii:email`, `redact:location:precise`.
///
/// Stored as a validated newtype rather than a bare `String` so that an
/// obligation can never be constructed from free text that slipped past the
/// policy engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Obligation(String);

impl Obligation {
    /// Construct an obligation from a `namespace:...` string. Rejects empty
    /// strings and strings without a namespace separator; the closed
    /// vocabulary itself is owned by the policy engine collaborator, not
    /// enumerated here.
    pub fn new(value: impl Into<String>) -> Result<Self, crate::error::EnvelopeError> {
        let value = value.into();
        if value.is_empty() || !value.contains(':') {
            return Err(crate::error::EnvelopeError::InvalidObligation { value });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Obligation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Structured actor reference: who (and from where) produced a request or event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub person_id: ActorPersonId,
    pub device_id: ActorDeviceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Actor {
    pub fn new(person_id: ActorPersonId, device_id: ActorDeviceId) -> Self {
        Self {
            person_id,
            device_id,
            role: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

/// Quality-of-service hints attached to an event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Qos {
    /// Delivery priority in `[0, 1]`.
    pub priority: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_budget_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<i64>,
}

impl Qos {
    pub fn new(priority: f64) -> Self {
        Self {
            priority: priority.clamp(0.0, 1.0),
            latency_budget_ms: None,
            deadline_ms: None,
        }
    }
}

/// Content-integrity hashes carried by the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hashes {
    #[serde(with = "hex_bytes32")]
    pub payload_sha256: [u8; 32],
}

mod hex_bytes32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(d)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32-byte hex digest"))
    }
}

/// Symbolic event kind. A closed set extensible only by registering a new
/// variant through [`EventType::custom`] (mirroring the gate's closed intent
/// vocabulary in spirit, but open for bus topics which are plainer strings).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(String);

impl EventType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `EventMeta`: the required metadata carried by every event on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMeta {
    pub event_id: EventId,
    pub topic: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub space_id: SpaceId,
    /// UTC timestamp, millisecond precision (epoch milliseconds).
    pub ts: i64,
    pub actor: Actor,
    pub band: Band,
    pub obligations: Vec<Obligation>,
    pub policy_version: String,
    pub qos: Qos,
    pub hashes: Hashes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<Vec<u8>>,
    pub trace_id: TraceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<IdempotencyKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_ms: Option<i64>,
    /// Opaque MLS group reference; required whenever `band.requires_mls_group()`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mls_group: Option<String>,
}

impl EventMeta {
    /// The deduplication key: `idempotency_key` if present, else `event_id`.
    pub fn dedupe_key(&self) -> String {
        match &self.idempotency_key {
            Some(key) => key.to_string(),
            None => self.event_id.to_string(),
        }
    }

    /// Whether this event is expired relative to `now_ms`, per `ttl_ms`.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        match self.ttl_ms {
            Some(ttl) => now_ms >= self.ts.saturating_add(ttl),
            None => false,
        }
    }

    /// Validate the envelope invariants that don't require external
    /// collaborators (topic shape, space-scoping, band/mls_group coupling).
    /// Schema/policy validation against a topic's declared payload schema is
    /// the bus's `before_publish` middleware's job, not this method's.
    pub fn validate(&self) -> Result<(), crate::error::EnvelopeError> {
        if !TOPIC_PATTERN.is_match(&self.topic) {
            return Err(crate::error::EnvelopeError::InvalidTopic {
                topic: self.topic.clone(),
            });
        }
        if self.band.requires_mls_group() && self.mls_group.as_deref().unwrap_or("").is_empty() {
            return Err(crate::error::EnvelopeError::MissingMlsGroup { band: self.band });
        }
        if !(0.0..=1.0).contains(&self.qos.priority) {
            return Err(crate::error::EnvelopeError::PriorityOutOfRange {
                priority: self.qos.priority,
            });
        }
        Ok(())
    }
}

/// A complete event: metadata plus a redaction-applied JSON payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub meta: EventMeta,
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(meta: EventMeta, payload: serde_json::Value) -> Self {
        Self { meta, payload }
    }

    /// Compute and attach `hashes.payload_sha256` from the current payload.
    pub fn with_computed_hash(mut self) -> Self {
        self.meta.hashes.payload_sha256 = crate::canon::payload_sha256(&self.payload);
        self
    }

    /// Check that the stored hash matches the canonical hash of the current
    /// payload (used on deserialize / WAL read to detect tampering or bugs).
    pub fn hash_matches_payload(&self) -> bool {
        crate::canon::payload_sha256(&self.payload) == self.meta.hashes.payload_sha256
    }
}

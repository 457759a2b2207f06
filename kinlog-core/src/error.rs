//! Error taxonomy for the event fabric.
//!
//! Internal code uses `Result`/`?` throughout; these enums exist to name the
//! error kinds in spec §7 (Envelope invalid, Storage fault, Backpressure,
//! Authorization denied, Handler failure, Timeout, Policy deny, Corruption)
//! as real types instead of ad-hoc strings. `FabricError` is the aggregate
//! only the outermost boundary of a crate needs to construct; most call
//! sites propagate one of the smaller per-concern enums with `?`.

use thiserror::Error;

use crate::envelope::Band;

/// Envelope shape/invariant violations. Local to the publisher: these never
/// reach the WAL.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EnvelopeError {
    #[error("topic '{topic}' does not match the required pattern")]
    InvalidTopic { topic: String },

    #[error("band {band:?} requires a non-empty mls_group reference")]
    MissingMlsGroup { band: Band },

    #[error("qos.priority {priority} is outside [0, 1]")]
    PriorityOutOfRange { priority: f64 },

    #[error("obligation '{value}' is not a valid namespace:category string")]
    InvalidObligation { value: String },

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("payload_sha256 does not match canonical hash of payload")]
    HashMismatch,

    #[error("additionalProperties forbidden for schema-bound topic '{topic}': {field}")]
    AdditionalProperty { topic: String, field: String },
}

/// Durable-storage faults: WAL write/fsync failure, offset commit failure,
/// corrupted segment tail.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("segment {segment} for topic '{topic}' is sealed and cannot accept further writes")]
    SegmentSealed { topic: String, segment: u32 },

    #[error("offset commit failed for ({topic}, {group}): {reason}")]
    OffsetCommitFailed {
        topic: String,
        group: String,
        reason: String,
    },

    #[error("segment tail corruption in '{path}' at byte offset {byte_offset}, truncated")]
    TailCorruption { path: String, byte_offset: u64 },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("lmdb error: {0}")]
    Lmdb(String),
}

/// Backpressure conditions: queue full past wait budget, actor over token
/// budget, or breaker open.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackpressureError {
    #[error("subscription queue for ({topic}, {group}) is full")]
    QueueFull { topic: String, group: String },

    #[error("rate limited")]
    RateLimited,

    #[error("downstream topic '{topic}' circuit breaker is open")]
    DownstreamUnhealthy { topic: String },
}

/// Authorization failures: middleware denies based on band/obligations
/// mismatch against a subscription's declared capability set.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("authorization denied for subscription '{group}' on topic '{topic}': {reason}")]
pub struct AuthorizationError {
    pub topic: String,
    pub group: String,
    pub reason: String,
}

/// A handler raised or returned `Nack`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("handler failed for ({topic}, {group}) at offset {offset}: {reason}")]
pub struct HandlerError {
    pub topic: String,
    pub group: String,
    pub offset: u64,
    pub reason: String,
}

/// Ack deadline elapsed without a response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("ack deadline of {deadline_ms}ms elapsed for ({topic}, {group}) at offset {offset}")]
pub struct TimeoutError {
    pub topic: String,
    pub group: String,
    pub offset: u64,
    pub deadline_ms: u64,
}

/// The gate or a middleware denied an event/request on policy grounds. Final.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("policy denied: {reason}")]
pub struct PolicyError {
    pub reason: String,
}

/// Segment-tail truncation on recovery. Non-fatal, always logged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("corruption at byte offset {byte_offset} in '{path}', truncated on recovery")]
pub struct CorruptionError {
    pub path: String,
    pub byte_offset: u64,
}

/// Configuration validation failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Errors returned from `EventBusCore::publish`.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Backpressure(#[from] BackpressureError),

    #[error("event bus is stopped")]
    Stopped,
}

/// Errors returned from `EventBusCore::subscribe`/`unsubscribe`/`replay`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubscribeError {
    #[error("topic '{topic}' is unknown")]
    UnknownTopic { topic: String },

    #[error("consumer group '{group}' already subscribed to topic '{topic}'")]
    DuplicateGroup { topic: String, group: String },

    #[error("subscription options invalid: {reason}")]
    InvalidOptions { reason: String },

    #[error("no such subscription handle")]
    UnknownHandle,
}

/// Top-level error aggregate for crate boundaries that need one error type
/// (e.g. a CLI-style embedding binary). Most internal code should propagate
/// the narrower enum above instead of constructing this directly.
#[derive(Debug, Error)]
pub enum FabricError {
    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("backpressure error: {0}")]
    Backpressure(#[from] BackpressureError),

    #[error("authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("handler error: {0}")]
    Handler(#[from] HandlerError),

    #[error("timeout error: {0}")]
    Timeout(#[from] TimeoutError),

    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("corruption error: {0}")]
    Corruption(#[from] CorruptionError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("subscribe error: {0}")]
    Subscribe(#[from] SubscribeError),
}

pub type FabricResult<T> = Result<T, FabricError>;

/// High-level categorization used to decide whether a `FabricError` is worth
/// retrying. Mirrors the domain/operational split used at retry-decision
/// boundaries without replicating a full effect-replay machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Worth a retry per the subscription's backoff schedule.
    Retryable,
    /// Never worth retrying; route straight to DLQ / reject immediately.
    Terminal,
}

impl FabricError {
    pub fn class(&self) -> ErrorClass {
        match self {
            FabricError::Storage(_)
            | FabricError::Backpressure(_)
            | FabricError::Timeout(_)
            | FabricError::Handler(_) => ErrorClass::Retryable,
            FabricError::Envelope(_)
            | FabricError::Authorization(_)
            | FabricError::Policy(_)
            | FabricError::Corruption(_)
            | FabricError::Config(_)
            | FabricError::Publish(_)
            | FabricError::Subscribe(_) => ErrorClass::Terminal,
        }
    }
}

//! Envelope types, error taxonomy, configuration, and backpressure
//! primitives shared by every crate in the kinlog event fabric.

pub mod backpressure;
pub mod canon;
pub mod collaborators;
pub mod config;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod health;
pub mod ids;
pub mod signer;

pub use envelope::{Actor, Band, Event, EventMeta, EventType, Hashes, Obligation, Qos};
pub use error::{FabricError, FabricResult};
pub use ids::{
    ActorDeviceId, ActorPersonId, EntityIdType, EpisodeId, EventId, IdempotencyKey, LinkId,
    RequestId, SpaceId, TraceId,
};

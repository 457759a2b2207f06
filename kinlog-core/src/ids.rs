//! Strongly-typed identifiers for the event fabric.

use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;
use uuid::Uuid;

/// Trait for type-safe, UUID-backed entity IDs.
///
/// Keeps space/actor/trace identifiers from being accidentally interchanged
/// at a call site, even though they all wrap the same underlying UUID type.
pub trait EntityIdType:
    Copy
    + Clone
    + Eq
    + PartialEq
    + Hash
    + fmt::Debug
    + fmt::Display
    + FromStr
    + Serialize
    + serde::de::DeserializeOwned
    + Send
    + Sync
    + 'static
{
    const ENTITY_NAME: &'static str;

    fn new(uuid: Uuid) -> Self;
    fn as_uuid(&self) -> Uuid;

    fn nil() -> Self {
        Self::new(Uuid::nil())
    }

    fn now_v7() -> Self {
        Self::new(Uuid::now_v7())
    }
}

/// Error returned when parsing an entity ID from a string fails.
#[derive(Debug, Clone)]
pub struct EntityIdParseError {
    pub entity_name: &'static str,
    pub input: String,
    pub source: uuid::Error,
}

impl fmt::Display for EntityIdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to parse {} id from '{}': {}",
            self.entity_name, self.input, self.source
        )
    }
}

impl std::error::Error for EntityIdParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

macro_rules! define_entity_id {
    ($name:ident, $entity:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(Uuid);

        impl EntityIdType for $name {
            const ENTITY_NAME: &'static str = $entity;

            fn new(uuid: Uuid) -> Self {
                Self(uuid)
            }

            fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl $name {
            /// Wrap an existing UUID without generating a new one.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = EntityIdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::from_str(s)
                    .map(Self::new)
                    .map_err(|e| EntityIdParseError {
                        entity_name: Self::ENTITY_NAME,
                        input: s.to_string(),
                        source: e,
                    })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::nil()
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                self.0.serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                Uuid::deserialize(deserializer).map(Self::new)
            }
        }
    };
}

define_entity_id!(
    SpaceId,
    "space",
    "Scope identifier isolating events, keys, and access policy. No cross-space joins."
);
define_entity_id!(
    ActorPersonId,
    "actor_person",
    "Identifier for the person behind a request or event."
);
define_entity_id!(
    ActorDeviceId,
    "actor_device",
    "Identifier for the originating device."
);
define_entity_id!(TraceId, "trace", "Correlation id propagated across all hops.");
define_entity_id!(
    IdempotencyKey,
    "idempotency_key",
    "Deduplication key; falls back to the event id when absent."
);
define_entity_id!(RequestId, "request", "Identifier for a Request submitted to the Attention Gate.");
define_entity_id!(EpisodeId, "episode", "Identifier for a Segment (episode) in the episodic store.");
define_entity_id!(LinkId, "link", "Identifier for a cross-reference link edge.");

/// Monotonically sortable event identifier: a 128-bit ULID (millisecond
/// timestamp prefix + 80 bits of randomness), rendered as Crockford Base32.
///
/// `uuid::Uuid::now_v7` is also timestamp-ordered but does not produce the
/// Crockford Base32 string form the envelope format requires, so events use
/// a real ULID type instead of a UUID newtype.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(Ulid);

impl EventId {
    /// Generate a new event id from the current wall-clock time.
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// Construct an event id from an explicit millisecond timestamp, for
    /// deterministic tests and replay fixtures.
    pub fn from_timestamp_ms(ts_ms: u64, random: u128) -> Self {
        Self(Ulid::from_parts(ts_ms, random))
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.0.timestamp_ms()
    }

    pub fn as_u128(&self) -> u128 {
        self.0.0
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

impl Serialize for EventId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ulid::from_string(&s)
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

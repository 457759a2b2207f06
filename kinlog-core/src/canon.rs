//! Canonical JSON encoding and payload hashing (spec: UTF-8, keys sorted
//! lexicographically, no insignificant whitespace, numbers in shortest
//! round-trip form, arrays in declared order).

use sha2::{Digest, Sha256};
use serde_json::Value;

/// Render a JSON value into its canonical byte form.
///
/// `serde_json::Value` backed by a `BTreeMap`-ordered object (the default
/// for `serde_json` when the `preserve_order` feature is off) already sorts
/// object keys lexicographically, and `serde_json::to_vec` already produces
/// the shortest round-trip numeric form with no insignificant whitespace, so
/// canonicalization here is just serializing with that representation.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).expect("serde_json::Value serialization is infallible")
}

/// SHA-256 over the canonical JSON encoding of a payload.
pub fn payload_sha256(payload: &Value) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(canonical_bytes(payload));
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Length-prefixed byte string over `(event_id, topic, payload_sha256,
/// policy_version)` in that order, the exact tuple a `Signer` signs.
pub fn signable_tuple(
    event_id: &str,
    topic: &str,
    payload_sha256: &[u8; 32],
    policy_version: &str,
) -> Vec<u8> {
    let mut buf = Vec::new();
    for field in [event_id.as_bytes(), topic.as_bytes(), payload_sha256.as_slice(), policy_version.as_bytes()] {
        buf.extend_from_slice(&(field.len() as u32).to_be_bytes());
        buf.extend_from_slice(field);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_key_order_does_not_affect_hash() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(payload_sha256(&a), payload_sha256(&b));
    }

    #[test]
    fn array_order_does_affect_hash() {
        let a = json!({"xs": [1, 2, 3]});
        let b = json!({"xs": [3, 2, 1]});
        assert_ne!(payload_sha256(&a), payload_sha256(&b));
    }

    #[test]
    fn signable_tuple_is_length_prefixed_and_distinguishes_field_boundaries() {
        let a = signable_tuple("ev", "topicx", &[0u8; 32], "v1");
        let b = signable_tuple("evt", "opicx", &[0u8; 32], "v1");
        assert_ne!(a, b, "concatenation without length prefixes would collide here");
    }
}

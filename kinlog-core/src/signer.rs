//! Pluggable event signing.
//!
//! spec leaves the signing algorithm as "best available" rather than
//! naming one. `Signer` makes that choice swappable instead of baked into
//! the envelope: a local single-device deployment can run unsigned, a
//! multi-device space can plug in an HMAC (shared MLS-derived key) or, when
//! wired up by the embedding application, an asymmetric signer.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::canon::signable_tuple;

/// Signs and verifies the `(event_id, topic, payload_sha256, policy_version)`
/// tuple that `EventMeta::signature` covers.
pub trait Signer: Send + Sync {
    fn sign(
        &self,
        event_id: &str,
        topic: &str,
        payload_sha256: &[u8; 32],
        policy_version: &str,
    ) -> Vec<u8>;

    fn verify(
        &self,
        event_id: &str,
        topic: &str,
        payload_sha256: &[u8; 32],
        policy_version: &str,
        signature: &[u8],
    ) -> bool;
}

/// Default signer for local, single-device deployments: produces no
/// signature, and treats any signature byte string as unverifiable rather
/// than trivially valid.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsignedSigner;

impl Signer for UnsignedSigner {
    fn sign(&self, _: &str, _: &str, _: &[u8; 32], _: &str) -> Vec<u8> {
        Vec::new()
    }

    fn verify(&self, _: &str, _: &str, _: &[u8; 32], _: &str, signature: &[u8]) -> bool {
        signature.is_empty()
    }
}

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 signer keyed by a pre-shared secret, e.g. an MLS exporter
/// secret for the event's `mls_group`. Suitable for multi-device spaces
/// where all members hold the same symmetric key.
pub struct HmacSigner {
    key: Vec<u8>,
}

impl HmacSigner {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }
}

impl Signer for HmacSigner {
    fn sign(
        &self,
        event_id: &str,
        topic: &str,
        payload_sha256: &[u8; 32],
        policy_version: &str,
    ) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(&signable_tuple(event_id, topic, payload_sha256, policy_version));
        mac.finalize().into_bytes().to_vec()
    }

    fn verify(
        &self,
        event_id: &str,
        topic: &str,
        payload_sha256: &[u8; 32],
        policy_version: &str,
        signature: &[u8],
    ) -> bool {
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(&signable_tuple(event_id, topic, payload_sha256, policy_version));
        mac.verify_slice(signature).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_signer_rejects_any_nonempty_signature() {
        let signer = UnsignedSigner;
        let sig = signer.sign("e1", "t1", &[0u8; 32], "v1");
        assert!(sig.is_empty());
        assert!(signer.verify("e1", "t1", &[0u8; 32], "v1", &sig));
        assert!(!signer.verify("e1", "t1", &[0u8; 32], "v1", &[1, 2, 3]));
    }

    #[test]
    fn hmac_signer_round_trips() {
        let signer = HmacSigner::new(b"shared-mls-secret".to_vec());
        let sig = signer.sign("e1", "t1", &[7u8; 32], "v1");
        assert!(signer.verify("e1", "t1", &[7u8; 32], "v1", &sig));
    }

    #[test]
    fn hmac_signer_rejects_tampered_fields() {
        let signer = HmacSigner::new(b"shared-mls-secret".to_vec());
        let sig = signer.sign("e1", "t1", &[7u8; 32], "v1");
        assert!(!signer.verify("e1", "t1-tampered", &[7u8; 32], "v1", &sig));
    }

    #[test]
    fn different_keys_produce_different_signatures() {
        let a = HmacSigner::new(b"key-a".to_vec());
        let b = HmacSigner::new(b"key-b".to_vec());
        let sig_a = a.sign("e1", "t1", &[1u8; 32], "v1");
        assert!(!b.verify("e1", "t1", &[1u8; 32], "v1", &sig_a));
    }
}

//! Hash-chained receipts for gate decisions and bus commits, spec §2's
//! "Receipts & Audit" row. Each receipt carries a Blake3 hash of its
//! predecessor plus the SHA-256 canonical hash of its own subject payload,
//! so tampering with history (reordering, deleting, or editing a receipt)
//! breaks the chain at the point of tampering.
//!
//! Modeled after the teacher's `HashChain` (`prev_hash`/`event_hash` pair,
//! genesis has a zero `prev_hash`) and `EnhancedProvenance`'s
//! chain-of-custody record keeping.

use kinlog_core::canon::payload_sha256;
use serde::{Deserialize, Serialize};

/// What a receipt attests to. Kept small and closed: a receipt names its
/// subject, it doesn't carry the subject's full payload (the payload hash
/// is enough to detect tampering against whatever store holds the original).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReceiptSubject {
    GateDecision { request_id: String, action: String },
    BusCommit { topic: String, segment: u32, offset: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub seq: u64,
    pub ts: i64,
    pub subject: ReceiptSubject,
    #[serde(with = "hex32")]
    pub payload_hash: [u8; 32],
    #[serde(with = "hex32")]
    pub prev_hash: [u8; 32],
    #[serde(with = "hex32")]
    pub receipt_hash: [u8; 32],
    pub signature: Option<Vec<u8>>,
}

mod hex32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(d)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes.try_into().map_err(|_| serde::de::Error::custom("expected 32 bytes"))
    }
}

fn link_hash(prev_hash: &[u8; 32], payload_hash: &[u8; 32], seq: u64) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(prev_hash);
    hasher.update(payload_hash);
    hasher.update(&seq.to_be_bytes());
    *hasher.finalize().as_bytes()
}

/// Appends receipts to a growing hash chain. `ReceiptChain` itself holds no
/// storage: the caller persists each `Receipt` (e.g. via `kinlog-bus`'s WAL
/// or an audit-specific append log) and is responsible for reloading
/// `last_hash`/`next_seq` from the last persisted receipt on restart.
pub struct ReceiptChain {
    last_hash: [u8; 32],
    next_seq: u64,
    signing_key: Option<Vec<u8>>,
}

impl ReceiptChain {
    pub fn new() -> Self {
        Self {
            last_hash: [0u8; 32],
            next_seq: 0,
            signing_key: None,
        }
    }

    /// Resume an existing chain from its last persisted receipt.
    pub fn resume_from(last: &Receipt) -> Self {
        Self {
            last_hash: last.receipt_hash,
            next_seq: last.seq + 1,
            signing_key: None,
        }
    }

    pub fn with_signing_key(mut self, key: Vec<u8>) -> Self {
        self.signing_key = Some(key);
        self
    }

    pub fn append(&mut self, subject: ReceiptSubject, payload: &serde_json::Value, ts: i64) -> Receipt {
        let payload_hash = payload_sha256(payload);
        let receipt_hash = link_hash(&self.last_hash, &payload_hash, self.next_seq);
        let signature = self.signing_key.as_ref().map(|key| sign(key, &receipt_hash));

        let receipt = Receipt {
            seq: self.next_seq,
            ts,
            subject,
            payload_hash,
            prev_hash: self.last_hash,
            receipt_hash,
            signature,
        };

        self.last_hash = receipt_hash;
        self.next_seq += 1;
        receipt
    }
}

impl Default for ReceiptChain {
    fn default() -> Self {
        Self::new()
    }
}

fn sign(key: &[u8], receipt_hash: &[u8; 32]) -> Vec<u8> {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(receipt_hash);
    mac.finalize().into_bytes().to_vec()
}

/// Verify a signature against a receipt's hash using the same key the chain
/// was constructed with.
pub fn verify_signature(key: &[u8], receipt: &Receipt) -> bool {
    match &receipt.signature {
        Some(sig) => sign(key, &receipt.receipt_hash) == *sig,
        None => false,
    }
}

/// Walk a sequence of receipts checking every link: `seq` is contiguous,
/// `prev_hash` matches the previous receipt's `receipt_hash` (zero for the
/// first), and `receipt_hash` recomputes correctly from its inputs. Returns
/// the index of the first broken link, if any.
pub fn verify_chain(receipts: &[Receipt]) -> Result<(), usize> {
    let mut expected_prev = [0u8; 32];
    for (i, receipt) in receipts.iter().enumerate() {
        if receipt.seq != i as u64 {
            return Err(i);
        }
        if receipt.prev_hash != expected_prev {
            return Err(i);
        }
        let recomputed = link_hash(&receipt.prev_hash, &receipt.payload_hash, receipt.seq);
        if recomputed != receipt.receipt_hash {
            return Err(i);
        }
        expected_prev = receipt.receipt_hash;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_receipt_has_a_zero_prev_hash() {
        let mut chain = ReceiptChain::new();
        let r = chain.append(
            ReceiptSubject::GateDecision {
                request_id: "r1".to_string(),
                action: "ADMIT".to_string(),
            },
            &serde_json::json!({"a": 1}),
            0,
        );
        assert_eq!(r.prev_hash, [0u8; 32]);
        assert_eq!(r.seq, 0);
    }

    #[test]
    fn consecutive_receipts_link_by_hash() {
        let mut chain = ReceiptChain::new();
        let r1 = chain.append(
            ReceiptSubject::BusCommit {
                topic: "t".to_string(),
                segment: 0,
                offset: 0,
            },
            &serde_json::json!({"a": 1}),
            0,
        );
        let r2 = chain.append(
            ReceiptSubject::BusCommit {
                topic: "t".to_string(),
                segment: 0,
                offset: 1,
            },
            &serde_json::json!({"a": 2}),
            1,
        );
        assert_eq!(r2.prev_hash, r1.receipt_hash);
        assert!(verify_chain(&[r1, r2]).is_ok());
    }

    #[test]
    fn tampering_with_a_payload_hash_breaks_verification() {
        let mut chain = ReceiptChain::new();
        let r1 = chain.append(
            ReceiptSubject::BusCommit {
                topic: "t".to_string(),
                segment: 0,
                offset: 0,
            },
            &serde_json::json!({"a": 1}),
            0,
        );
        let mut r2 = chain.append(
            ReceiptSubject::BusCommit {
                topic: "t".to_string(),
                segment: 0,
                offset: 1,
            },
            &serde_json::json!({"a": 2}),
            1,
        );
        r2.payload_hash = [9u8; 32];
        assert_eq!(verify_chain(&[r1, r2]), Err(1));
    }

    #[test]
    fn signed_receipts_verify_against_the_signing_key() {
        let mut chain = ReceiptChain::new().with_signing_key(b"audit-key".to_vec());
        let r = chain.append(
            ReceiptSubject::GateDecision {
                request_id: "r1".to_string(),
                action: "ADMIT".to_string(),
            },
            &serde_json::json!({"a": 1}),
            0,
        );
        assert!(verify_signature(b"audit-key", &r));
        assert!(!verify_signature(b"wrong-key", &r));
    }

    #[test]
    fn resuming_a_chain_continues_the_sequence_and_links_to_the_prior_hash() {
        let mut chain = ReceiptChain::new();
        let r1 = chain.append(
            ReceiptSubject::BusCommit {
                topic: "t".to_string(),
                segment: 0,
                offset: 0,
            },
            &serde_json::json!({"a": 1}),
            0,
        );
        let mut resumed = ReceiptChain::resume_from(&r1);
        let r2 = resumed.append(
            ReceiptSubject::BusCommit {
                topic: "t".to_string(),
                segment: 0,
                offset: 1,
            },
            &serde_json::json!({"a": 2}),
            1,
        );
        assert!(verify_chain(&[r1, r2]).is_ok());
    }
}

//! Narrow interfaces for the external collaborators named in spec §6.4:
//! policy decisions, redaction, MLS sealing, and (optional) embeddings. None
//! of these are implemented in this workspace — a policy decision engine,
//! content redactor, and MLS group encryptor are all out of scope, consumed
//! here only as trait objects an embedding application wires in. Mocks for
//! tests live in `kinlog-test-utils`.

use crate::envelope::{Band, Obligation};

/// Decision returned by a policy engine evaluating a request or event.
/// Synchronous, in-process, no I/O, per spec §6.4.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyDecision {
    pub band: Band,
    pub obligations: Vec<Obligation>,
    pub redact_categories: Vec<String>,
    pub allow: bool,
    pub reasons: Vec<String>,
}

pub trait PolicyEngine: Send + Sync {
    fn evaluate(&self, actor_role: &str, topic: &str, payload: &serde_json::Value) -> PolicyDecision;
}

/// Redacts a payload or a text string given the obligations a policy
/// decision attached. Pure function: no I/O, no state.
pub trait Redactor: Send + Sync {
    fn redact_payload(&self, payload: &serde_json::Value, obligations: &[Obligation]) -> serde_json::Value;
    fn redact_text(&self, text: &str, obligations: &[Obligation]) -> String;
}

/// MLS group sealing/opening. Keys are obtained from a key manager this
/// interface does not model; callers supply the already-derived key.
pub trait MlsEncryptor: Send + Sync {
    fn seal(&self, key: &[u8], space_id: &str, epoch: u64, sender: &str, aad: &[u8], plaintext: &[u8]) -> Vec<u8>;
    fn open(&self, key: &[u8], envelope: &[u8]) -> Option<Vec<u8>>;
}

/// Optional text embedder consumed by the Segmentation Engine's `S_t` term.
/// When no embedder is wired in, Segmentation falls back to a token-set
/// Jaccard distance (spec §6.4, "a fallback token-set distance MUST be
/// implemented when embeddings are unavailable").
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Vec<f32>;
}

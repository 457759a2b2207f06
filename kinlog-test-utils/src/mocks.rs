//! Deterministic mock implementations of the external collaborators named
//! in spec §6.4. None of these perform real policy evaluation, redaction,
//! or cryptography — they exist only to give tests a concrete, predictable
//! collaborator to plug in, the same role `MockEmbeddingProvider` plays in
//! the teacher's test-utils crate.

use kinlog_core::collaborators::{Embedder, MlsEncryptor, PolicyDecision, PolicyEngine, Redactor};
use kinlog_core::envelope::{Band, Obligation};

/// Allows everything at `GREEN` with no obligations. Useful as the default
/// collaborator in tests that aren't exercising policy behavior.
#[derive(Debug, Default, Clone, Copy)]
pub struct PermissiveMockPolicyEngine;

impl PolicyEngine for PermissiveMockPolicyEngine {
    fn evaluate(&self, _actor_role: &str, _topic: &str, _payload: &serde_json::Value) -> PolicyDecision {
        PolicyDecision {
            band: Band::Green,
            obligations: vec![],
            redact_categories: vec![],
            allow: true,
            reasons: vec![],
        }
    }
}

/// Denies any topic containing `"denied"`, otherwise behaves like
/// `PermissiveMockPolicyEngine`. Lets tests exercise the deny path without
/// a real rules engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenylistMockPolicyEngine;

impl PolicyEngine for DenylistMockPolicyEngine {
    fn evaluate(&self, _actor_role: &str, topic: &str, _payload: &serde_json::Value) -> PolicyDecision {
        if topic.contains("denied") {
            PolicyDecision {
                band: Band::Red,
                obligations: vec![],
                redact_categories: vec![],
                allow: false,
                reasons: vec!["topic is on the test denylist".to_string()],
            }
        } else {
            PolicyDecision {
                band: Band::Green,
                obligations: vec![],
                redact_categories: vec![],
                allow: true,
                reasons: vec![],
            }
        }
    }
}

/// Replaces every occurrence of a redacted category's name (used as a
/// stand-in for a real matcher) with `[REDACTED]`. Category-aware but not a
/// real PII/PHI classifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockRedactor;

impl Redactor for MockRedactor {
    fn redact_payload(&self, payload: &serde_json::Value, obligations: &[Obligation]) -> serde_json::Value {
        match payload {
            serde_json::Value::String(s) => serde_json::Value::String(self.redact_text(s, obligations)),
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.redact_payload(v, obligations)))
                    .collect(),
            ),
            serde_json::Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(|v| self.redact_payload(v, obligations)).collect())
            }
            other => other.clone(),
        }
    }

    fn redact_text(&self, text: &str, obligations: &[Obligation]) -> String {
        if obligations.is_empty() {
            return text.to_string();
        }
        format!("[REDACTED:{}] {}", obligations.len(), text)
    }
}

/// A no-op "seal" that just prefixes the plaintext with the sender and
/// epoch, and an "open" that reverses it. Not encryption: real MLS sealing
/// is an external collaborator this mock only stands in for at the
/// call-site shape.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMlsEncryptor;

impl MlsEncryptor for NoopMlsEncryptor {
    fn seal(&self, _key: &[u8], space_id: &str, epoch: u64, sender: &str, _aad: &[u8], plaintext: &[u8]) -> Vec<u8> {
        let header = format!("{space_id}|{epoch}|{sender}|");
        let mut out = header.into_bytes();
        out.extend_from_slice(plaintext);
        out
    }

    fn open(&self, _key: &[u8], envelope: &[u8]) -> Option<Vec<u8>> {
        let pos = envelope.iter().enumerate().filter(|(_, b)| **b == b'|').nth(2)?.0;
        Some(envelope[pos + 1..].to_vec())
    }
}

/// Deterministic hash-based fake embedding, the same technique the
/// teacher's `MockEmbeddingProvider` uses: no real model, but stable and
/// distance-meaningful enough for tests that just need "similar text gets a
/// similar vector."
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    dimensions: usize,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(32)
    }
}

impl Embedder for MockEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut data = vec![0.0f32; self.dimensions];
        for (i, byte) in text.bytes().enumerate() {
            let idx = i % self.dimensions;
            data[idx] += byte as f32 / 255.0;
        }
        let norm: f32 = data.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut data {
                *x /= norm;
            }
        }
        data
    }
}

//! Mocks, fixtures, and proptest generators shared across the workspace's
//! test suites, mirroring the role the teacher's own test-utils crate plays
//! for its provenance and embedding tests.

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use fixtures::{sample_event, sample_event_with_band, sample_obligation};
pub use generators::{affect_strategy, band_strategy, request_strategy};
pub use mocks::{DenylistMockPolicyEngine, MockEmbedder, MockRedactor, NoopMlsEncryptor, PermissiveMockPolicyEngine};

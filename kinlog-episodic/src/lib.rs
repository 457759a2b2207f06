//! Space-scoped episodic event store: LMDB-backed rows, a crash-safe
//! per-space WAL, the Segmentation Engine, and the Temporal Index.

pub mod keys;
pub mod rows;
pub mod segmentation;
pub mod store;
pub mod temporal;
pub mod wal;

pub use rows::{Affect, CrossRefLink, EventRow, RedactionMeta, RefKind, SegmentEventLink, SegmentRow};
pub use segmentation::{EventSignal, SegmentationEngine, SegmentationOutcome, SpaceState};
pub use store::{EpisodicStore, QueryOrder};

//! Row types persisted by the episodic store, spec §3.6.

use serde::{Deserialize, Serialize};

use kinlog_core::envelope::{Actor, Band};
use kinlog_core::ids::{EpisodeId, LinkId, SpaceId, TraceId};
use kinlog_core::ids::EventId;

/// Valence/arousal scalar pair carried alongside an event or segment span.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affect {
    /// `[-1, 1]`, negative to positive.
    pub valence: f64,
    /// `[0, 1]`, calm to activated.
    pub arousal: f64,
}

impl Affect {
    pub fn neutral() -> Self {
        Self { valence: 0.0, arousal: 0.0 }
    }

    /// `(|v_t - v_{t-1}| + |a_t - a_{t-1}|) / 2`, the `A_t` term of the
    /// boundary score (spec §4.8).
    pub fn distance(&self, prev: &Affect) -> f64 {
        ((self.valence - prev.valence).abs() + (self.arousal - prev.arousal).abs()) / 2.0
    }
}

/// What survives a redaction/tombstone pass over an event's payload, kept
/// alongside the row so a reader can tell a redacted row from an intact one
/// without re-deriving it from the obligations list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RedactionMeta {
    pub redacted: bool,
    pub tombstoned: bool,
    pub reason: Option<String>,
}

/// `Event row`: `{space_id, event_id, ts, band, title, summary, tags,
/// affect, attachments_meta, salience, redaction_meta, origin, trace_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRow {
    pub space_id: SpaceId,
    pub event_id: EventId,
    pub ts: i64,
    pub band: Band,
    pub title: String,
    pub summary: String,
    pub tags: Vec<String>,
    pub affect: Affect,
    pub attachments_meta: serde_json::Value,
    pub salience: f64,
    pub redaction_meta: RedactionMeta,
    pub origin: Actor,
    pub trace_id: TraceId,
    /// Sticky goal label used by the `H_t` boundary term; not part of the
    /// spec's row fields but needed across calls, so it travels with the row
    /// rather than being recomputed.
    pub goal_label: Option<String>,
}

/// `Segment row`: `{space_id, episode_id, start_ts, end_ts, topic_hint,
/// salience, affect_span, boundary_reason[]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentRow {
    pub space_id: SpaceId,
    pub episode_id: EpisodeId,
    pub start_ts: i64,
    pub end_ts: Option<i64>,
    pub topic_hint: Option<String>,
    pub salience: f64,
    pub affect_span: (Affect, Affect),
    pub boundary_reason: Vec<String>,
    pub event_count: u64,
}

impl SegmentRow {
    pub fn is_open(&self) -> bool {
        self.end_ts.is_none()
    }
}

/// `Segment-Event link`: `{space_id, episode_id, event_id, ord}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SegmentEventLink {
    pub space_id: SpaceId,
    pub episode_id: EpisodeId,
    pub event_id: EventId,
    pub ord: u64,
}

/// `Cross-ref link`: `{space_id, link_id, src_kind, src_id, dst_kind,
/// dst_id, rel}`. `src_id`/`dst_id` are opaque strings since they may
/// reference either an `EventId` or an `EpisodeId`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossRefLink {
    pub space_id: SpaceId,
    pub link_id: LinkId,
    pub src_kind: RefKind,
    pub src_id: String,
    pub dst_kind: RefKind,
    pub dst_id: String,
    pub rel: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Event,
    Episode,
}

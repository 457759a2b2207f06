//! `EpisodicStore`: the space-scoped event store, spec §4.7. Ties together
//! the per-space WAL, the LMDB-backed tables, the Segmentation Engine, and
//! the Temporal Index.
//!
//! Write path: WAL append (fsync) → fold into segmentation → LMDB insert.
//! The row is never visible to a reader until the WAL fsync returns.
//!
//! Redaction/tombstoning never mutates a stored row's bytes; it writes into
//! a separate `redactions` table keyed the same way, which `get_event`
//! overlays onto the row it returns.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use kinlog_core::config::EpisodicConfig;
use kinlog_core::envelope::{Band, Event};
use kinlog_core::error::StorageError;
use kinlog_core::filter::FilterExpr;
use kinlog_core::ids::{EntityIdType, EpisodeId, EventId, LinkId, SpaceId};

use crate::keys::{cross_ref_key, event_key, link_key, link_prefix, open_segment_key, segment_key, space_prefix};
use crate::rows::{Affect, CrossRefLink, EventRow, RedactionMeta, SegmentRow};
use crate::segmentation::{EventSignal, SegmentationEngine, SpaceState};
use crate::temporal::recency_score;
use crate::wal::EpisodicWal;

/// Ranking axis for `query`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOrder {
    Recency,
    Salience,
}

pub struct EpisodicStore {
    env: Env,
    events: Database<Bytes, Bytes>,
    segments: Database<Bytes, Bytes>,
    links: Database<Bytes, Bytes>,
    cross_refs: Database<Bytes, Bytes>,
    open_segments: Database<Bytes, Bytes>,
    redactions: Database<Bytes, Bytes>,
    root: PathBuf,
    wals: Mutex<HashMap<SpaceId, EpisodicWal>>,
    space_states: Mutex<HashMap<SpaceId, SpaceState>>,
    segmentation: SegmentationEngine,
    half_life_ms: i64,
}

fn lmdb_err(e: heed::Error) -> StorageError {
    StorageError::Lmdb(e.to_string())
}

impl EpisodicStore {
    pub fn open(root: &Path, config: &EpisodicConfig) -> Result<Self, StorageError> {
        std::fs::create_dir_all(root).map_err(|e| StorageError::Io {
            path: root.display().to_string(),
            source: e,
        })?;
        let db_path = Path::new(&config.db_path);
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Io {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::create_dir_all(db_path).map_err(|e| StorageError::Io {
            path: db_path.display().to_string(),
            source: e,
        })?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(config.map_size_bytes)
                .max_dbs(6)
                .open(db_path)
        }
        .map_err(lmdb_err)?;

        let mut wtxn = env.write_txn().map_err(lmdb_err)?;
        let events = env.create_database(&mut wtxn, Some("events")).map_err(lmdb_err)?;
        let segments = env.create_database(&mut wtxn, Some("segments")).map_err(lmdb_err)?;
        let links = env.create_database(&mut wtxn, Some("segment_links")).map_err(lmdb_err)?;
        let cross_refs = env.create_database(&mut wtxn, Some("cross_refs")).map_err(lmdb_err)?;
        let open_segments = env.create_database(&mut wtxn, Some("open_segments")).map_err(lmdb_err)?;
        let redactions = env.create_database(&mut wtxn, Some("redactions")).map_err(lmdb_err)?;
        wtxn.commit().map_err(lmdb_err)?;

        Ok(Self {
            env,
            events,
            segments,
            links,
            cross_refs,
            open_segments,
            redactions,
            root: root.to_path_buf(),
            wals: Mutex::new(HashMap::new()),
            space_states: Mutex::new(HashMap::new()),
            segmentation: SegmentationEngine::new(config.segmentation),
            half_life_ms: config.half_life_ms,
        })
    }

    /// Probe the LMDB environment with a fresh read transaction: failure to
    /// open one (map corruption, disk exhaustion) is unhealthy rather than
    /// degraded, since every query and append depends on it.
    pub fn health(&self) -> kinlog_core::health::HealthCheck {
        use kinlog_core::health::HealthCheck;
        match self.env.read_txn() {
            Ok(_) => HealthCheck::healthy("episodic_store"),
            Err(e) => HealthCheck::unhealthy("episodic_store", e.to_string()),
        }
    }

    /// Append one event to its space. Builds the row from the envelope plus
    /// any payload fields the event carries, WAL-appends (fsync before
    /// return), folds the event into the Segmentation Engine, then persists
    /// to LMDB.
    pub fn append_event(&self, event: &Event, goal_label: Option<String>) -> Result<EventRow, StorageError> {
        let row = EventRow::from_event(event, goal_label);
        self.append_row(row)
    }

    fn append_row(&self, row: EventRow) -> Result<EventRow, StorageError> {
        let space_id = row.space_id;

        {
            let mut wals = self.wals.lock().expect("episodic wal lock poisoned");
            if !wals.contains_key(&space_id) {
                wals.insert(space_id, EpisodicWal::open(&self.root, space_id)?);
            }
            let wal = wals.get_mut(&space_id).expect("just inserted");
            wal.append(&row)?;
        }

        let outcome = {
            let mut states = self.space_states.lock().expect("episodic state lock poisoned");
            let state = states.entry(space_id).or_insert_with(|| SpaceState::new(space_id));
            let signal = EventSignal {
                ts: row.ts,
                content: &format!("{} {}", row.title, row.summary),
                affect: row.affect,
                goal_label: row.goal_label.as_deref(),
                salience: row.salience,
            };
            let outcome = self.segmentation.ingest(state, &signal);
            let open_row = self.segmentation.open_snapshot(state);
            (outcome, open_row)
        };
        let (outcome, open_row) = outcome;

        let mut wtxn = self.env.write_txn().map_err(lmdb_err)?;

        self.events
            .put(&mut wtxn, &event_key(space_id, row.event_id), &serde_json::to_vec(&row)?)
            .map_err(lmdb_err)?;

        let link = crate::rows::SegmentEventLink {
            space_id,
            episode_id: outcome.episode_id,
            event_id: row.event_id,
            ord: outcome.ord,
        };
        self.links
            .put(
                &mut wtxn,
                &link_key(space_id, outcome.episode_id, outcome.ord),
                &serde_json::to_vec(&link)?,
            )
            .map_err(lmdb_err)?;

        if let Some(closed) = &outcome.closed_segment {
            self.segments
                .put(&mut wtxn, &segment_key(space_id, closed.episode_id), &serde_json::to_vec(closed)?)
                .map_err(lmdb_err)?;
        }
        if let Some(open) = &open_row {
            self.segments
                .put(&mut wtxn, &segment_key(space_id, open.episode_id), &serde_json::to_vec(open)?)
                .map_err(lmdb_err)?;
            self.open_segments
                .put(&mut wtxn, &open_segment_key(space_id), open.episode_id.as_uuid().as_bytes())
                .map_err(lmdb_err)?;
        } else {
            self.open_segments.delete(&mut wtxn, &open_segment_key(space_id)).map_err(lmdb_err)?;
        }

        wtxn.commit().map_err(lmdb_err)?;
        Ok(row)
    }

    pub fn get_event(&self, space_id: SpaceId, event_id: EventId) -> Result<Option<EventRow>, StorageError> {
        let rtxn = self.env.read_txn().map_err(lmdb_err)?;
        let Some(bytes) = self.events.get(&rtxn, &event_key(space_id, event_id)).map_err(lmdb_err)? else {
            return Ok(None);
        };
        let mut row: EventRow = serde_json::from_slice(bytes)?;
        if let Some(meta_bytes) = self.redactions.get(&rtxn, &event_key(space_id, event_id)).map_err(lmdb_err)? {
            row.redaction_meta = serde_json::from_slice(meta_bytes)?;
        }
        Ok(Some(row))
    }

    pub fn get_episode(&self, space_id: SpaceId, episode_id: EpisodeId) -> Result<Option<SegmentRow>, StorageError> {
        let rtxn = self.env.read_txn().map_err(lmdb_err)?;
        match self.segments.get(&rtxn, &segment_key(space_id, episode_id)).map_err(lmdb_err)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }

    pub fn list_segments(&self, space_id: SpaceId) -> Result<Vec<SegmentRow>, StorageError> {
        let rtxn = self.env.read_txn().map_err(lmdb_err)?;
        let prefix = space_prefix(space_id);
        let mut rows = Vec::new();
        for entry in self.segments.iter(&rtxn).map_err(lmdb_err)? {
            let (key, bytes) = entry.map_err(lmdb_err)?;
            if key.len() >= prefix.len() && key[0..prefix.len()] == prefix[..] {
                rows.push(serde_json::from_slice::<SegmentRow>(bytes)?);
            }
        }
        rows.sort_by_key(|s| s.start_ts);
        Ok(rows)
    }

    /// Every event belonging to one episode, in `ord` order.
    pub fn replay(&self, space_id: SpaceId, episode_id: EpisodeId) -> Result<Vec<EventRow>, StorageError> {
        let rtxn = self.env.read_txn().map_err(lmdb_err)?;
        let prefix = link_prefix(space_id, episode_id);
        let mut links = Vec::new();
        for entry in self.links.iter(&rtxn).map_err(lmdb_err)? {
            let (key, bytes) = entry.map_err(lmdb_err)?;
            if key.len() >= prefix.len() && key[0..prefix.len()] == prefix[..] {
                links.push(serde_json::from_slice::<crate::rows::SegmentEventLink>(bytes)?);
            }
        }
        links.sort_by_key(|l| l.ord);

        let mut rows = Vec::with_capacity(links.len());
        for link in links {
            if let Some(bytes) = self.events.get(&rtxn, &event_key(space_id, link.event_id)).map_err(lmdb_err)? {
                rows.push(serde_json::from_slice::<EventRow>(bytes)?);
            }
        }
        Ok(rows)
    }

    /// Filtered, ranked query over one space's events. `BLACK` band events
    /// are excluded unconditionally: spec §4.7 forbids their external
    /// projection regardless of the filter passed in.
    pub fn query(
        &self,
        space_id: SpaceId,
        filter: &FilterExpr,
        order: QueryOrder,
        now_ms: i64,
    ) -> Result<Vec<EventRow>, StorageError> {
        let rtxn = self.env.read_txn().map_err(lmdb_err)?;
        let prefix = space_prefix(space_id);
        let mut rows = Vec::new();
        for entry in self.events.iter(&rtxn).map_err(lmdb_err)? {
            let (key, bytes) = entry.map_err(lmdb_err)?;
            if key.len() < prefix.len() || key[0..prefix.len()] != prefix[..] {
                continue;
            }
            let row: EventRow = serde_json::from_slice(bytes)?;
            if row.band == Band::Black {
                continue;
            }
            let doc = serde_json::to_value(&row)?;
            if filter.matches(&doc) {
                rows.push(row);
            }
        }
        match order {
            QueryOrder::Recency => rows.sort_by(|a, b| {
                let ra = recency_score(a.ts, now_ms, self.half_life_ms);
                let rb = recency_score(b.ts, now_ms, self.half_life_ms);
                rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal)
            }),
            QueryOrder::Salience => rows.sort_by(|a, b| b.salience.partial_cmp(&a.salience).unwrap_or(std::cmp::Ordering::Equal)),
        }
        Ok(rows)
    }

    pub fn relate(
        &self,
        space_id: SpaceId,
        src_kind: crate::rows::RefKind,
        src_id: String,
        dst_kind: crate::rows::RefKind,
        dst_id: String,
        rel: String,
    ) -> Result<LinkId, StorageError> {
        let link_id = LinkId::now_v7();
        let link = CrossRefLink {
            space_id,
            link_id,
            src_kind,
            src_id,
            dst_kind,
            dst_id,
            rel,
        };
        let mut wtxn = self.env.write_txn().map_err(lmdb_err)?;
        self.cross_refs
            .put(&mut wtxn, &cross_ref_key(space_id, link_id), &serde_json::to_vec(&link)?)
            .map_err(lmdb_err)?;
        wtxn.commit().map_err(lmdb_err)?;
        Ok(link_id)
    }

    /// Force-close a space's open segment (e.g. on graceful shutdown or an
    /// explicit user-facing "end this episode" action).
    pub fn segment_flush(&self, space_id: SpaceId, now_ms: i64) -> Result<Option<SegmentRow>, StorageError> {
        let closed = {
            let mut states = self.space_states.lock().expect("episodic state lock poisoned");
            let state = states.entry(space_id).or_insert_with(|| SpaceState::new(space_id));
            self.segmentation.flush(state, now_ms)
        };
        if let Some(closed) = &closed {
            let mut wtxn = self.env.write_txn().map_err(lmdb_err)?;
            self.segments
                .put(&mut wtxn, &segment_key(space_id, closed.episode_id), &serde_json::to_vec(closed)?)
                .map_err(lmdb_err)?;
            self.open_segments.delete(&mut wtxn, &open_segment_key(space_id)).map_err(lmdb_err)?;
            wtxn.commit().map_err(lmdb_err)?;
        }
        Ok(closed)
    }

    /// Mark an event redacted/tombstoned without touching its stored bytes:
    /// writes into the separate `redactions` table, which `get_event`
    /// overlays onto the row it returns.
    pub fn tombstone(&self, space_id: SpaceId, event_id: EventId, reason: String) -> Result<(), StorageError> {
        let meta = RedactionMeta {
            redacted: true,
            tombstoned: true,
            reason: Some(reason),
        };
        let mut wtxn = self.env.write_txn().map_err(lmdb_err)?;
        self.redactions
            .put(&mut wtxn, &event_key(space_id, event_id), &serde_json::to_vec(&meta)?)
            .map_err(lmdb_err)?;
        wtxn.commit().map_err(lmdb_err)?;
        Ok(())
    }

    /// Crash recovery: replay every space's WAL and re-fold each row into
    /// segmentation/LMDB, skipping rows already present in the `events`
    /// table (the WAL may contain rows that already made it to LMDB before
    /// the crash).
    pub fn recover(&self, space_id: SpaceId) -> Result<usize, StorageError> {
        let rows = crate::wal::read_all(&self.root, space_id)?;
        let mut replayed = 0;
        for row in rows {
            let rtxn = self.env.read_txn().map_err(lmdb_err)?;
            let already_present = self
                .events
                .get(&rtxn, &event_key(row.space_id, row.event_id))
                .map_err(lmdb_err)?
                .is_some();
            drop(rtxn);
            if already_present {
                continue;
            }
            self.reapply_row(row)?;
            replayed += 1;
        }
        Ok(replayed)
    }

    /// Like `append_row` but skips the WAL write: the row already came from
    /// the WAL during recovery.
    fn reapply_row(&self, row: EventRow) -> Result<(), StorageError> {
        let space_id = row.space_id;
        let outcome = {
            let mut states = self.space_states.lock().expect("episodic state lock poisoned");
            let state = states.entry(space_id).or_insert_with(|| SpaceState::new(space_id));
            let signal = EventSignal {
                ts: row.ts,
                content: &format!("{} {}", row.title, row.summary),
                affect: row.affect,
                goal_label: row.goal_label.as_deref(),
                salience: row.salience,
            };
            self.segmentation.ingest(state, &signal)
        };

        let mut wtxn = self.env.write_txn().map_err(lmdb_err)?;
        self.events
            .put(&mut wtxn, &event_key(space_id, row.event_id), &serde_json::to_vec(&row)?)
            .map_err(lmdb_err)?;
        let link = crate::rows::SegmentEventLink {
            space_id,
            episode_id: outcome.episode_id,
            event_id: row.event_id,
            ord: outcome.ord,
        };
        self.links
            .put(
                &mut wtxn,
                &link_key(space_id, outcome.episode_id, outcome.ord),
                &serde_json::to_vec(&link)?,
            )
            .map_err(lmdb_err)?;
        wtxn.commit().map_err(lmdb_err)?;
        Ok(())
    }
}

impl EventRow {
    /// Build a row from an admitted event's envelope and payload. Fields
    /// the payload doesn't carry fall back to reasonable empty defaults
    /// rather than failing the write: the episodic store accepts whatever
    /// the bus delivered to its topic.
    pub fn from_event(event: &Event, goal_label: Option<String>) -> Self {
        let payload = &event.payload;
        let title = payload.get("title").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let summary = payload
            .get("summary")
            .or_else(|| payload.get("text"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let tags = payload
            .get("tags")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|t| t.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let affect = payload
            .get("affect")
            .and_then(|v| serde_json::from_value::<Affect>(v.clone()).ok())
            .unwrap_or_else(Affect::neutral);
        let attachments_meta = payload.get("attachments_meta").cloned().unwrap_or_else(|| serde_json::json!({}));
        let salience = event.meta.qos.priority;

        EventRow {
            space_id: event.meta.space_id,
            event_id: event.meta.event_id,
            ts: event.meta.ts,
            band: event.meta.band,
            title,
            summary,
            tags,
            affect,
            attachments_meta,
            salience,
            redaction_meta: RedactionMeta::default(),
            origin: event.meta.actor.clone(),
            trace_id: event.meta.trace_id,
            goal_label,
        }
    }
}

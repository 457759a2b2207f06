//! Per-space JSONL WAL for crash safety ahead of the LMDB write, spec §4.7:
//! "writes to a per-space WAL (JSONL) for crash safety" before the row is
//! visible to readers. Simpler than the bus's WAL (no rotation, no offsets:
//! a crash-recovery pass just replays whatever wasn't yet applied to LMDB).

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use kinlog_core::error::StorageError;
use kinlog_core::ids::{EntityIdType, SpaceId};

use crate::rows::EventRow;

pub fn wal_path(root: &Path, space_id: SpaceId) -> PathBuf {
    root.join(".episodic")
        .join("wal")
        .join(format!("{}.events.jsonl", space_id.as_uuid()))
}

/// Single-writer append log for one space's events. `append` fsyncs before
/// returning, matching the "WAL append must fsync before the row is visible
/// to readers" invariant.
pub struct EpisodicWal {
    file: File,
}

impl EpisodicWal {
    pub fn open(root: &Path, space_id: SpaceId) -> Result<Self, StorageError> {
        let path = wal_path(root, space_id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Io {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StorageError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
        Ok(Self { file })
    }

    pub fn append(&mut self, row: &EventRow) -> Result<(), StorageError> {
        let mut line = serde_json::to_vec(row)?;
        line.push(b'\n');
        self.file.write_all(&line).map_err(|e| StorageError::Io {
            path: "<episodic wal>".to_string(),
            source: e,
        })?;
        self.file.sync_data().map_err(|e| StorageError::Io {
            path: "<episodic wal>".to_string(),
            source: e,
        })?;
        Ok(())
    }
}

/// Recovery pass: read every row still in the WAL. Tolerant of a truncated
/// final line (a crash mid-write), same contract as the bus WAL reader.
pub fn read_all(root: &Path, space_id: SpaceId) -> Result<Vec<EventRow>, StorageError> {
    let path = wal_path(root, space_id);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(&path).map_err(|e| StorageError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let reader = BufReader::new(file);
    let mut rows = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| StorageError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<EventRow>(&line) {
            Ok(row) => rows.push(row),
            Err(_) => {
                tracing::warn!(path = %path.display(), "truncated episodic WAL tail, stopping replay here");
                break;
            }
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinlog_core::envelope::{Actor, Band};
    use kinlog_core::ids::{ActorDeviceId, ActorPersonId, EventId, TraceId};
    use tempfile::TempDir;

    fn sample_row(space_id: SpaceId) -> EventRow {
        EventRow {
            space_id,
            event_id: EventId::generate(),
            ts: 0,
            band: Band::Green,
            title: "t".to_string(),
            summary: "s".to_string(),
            tags: vec![],
            affect: crate::rows::Affect::neutral(),
            attachments_meta: serde_json::json!({}),
            salience: 0.5,
            redaction_meta: Default::default(),
            origin: Actor::new(ActorPersonId::now_v7(), ActorDeviceId::now_v7()),
            trace_id: TraceId::now_v7(),
            goal_label: None,
        }
    }

    #[test]
    fn appended_rows_are_recovered_in_order() {
        let dir = TempDir::new().unwrap();
        let space = SpaceId::now_v7();
        let mut wal = EpisodicWal::open(dir.path(), space).unwrap();
        let a = sample_row(space);
        let b = sample_row(space);
        wal.append(&a).unwrap();
        wal.append(&b).unwrap();

        let rows = read_all(dir.path(), space).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].event_id, a.event_id);
        assert_eq!(rows[1].event_id, b.event_id);
    }

    #[test]
    fn missing_wal_file_recovers_as_empty() {
        let dir = TempDir::new().unwrap();
        let rows = read_all(dir.path(), SpaceId::now_v7()).unwrap();
        assert!(rows.is_empty());
    }
}

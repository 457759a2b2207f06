//! Append-only JSONL write-ahead log, one active segment per topic.
//!
//! Grounded on `caliber-storage::hybrid_dag`'s hot/cold split in spirit
//! (single writer, many readers, crash-safe) but the format itself is new:
//! a WAL segment is a plain newline-delimited JSON file rather than an LMDB
//! database, per the on-disk layout in the external interfaces section.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use kinlog_core::envelope::EventMeta;
use kinlog_core::error::StorageError;

/// A single WAL line: `{offset, meta, payload}`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct WalRecord {
    pub offset: u64,
    pub meta: EventMeta,
    pub payload: serde_json::Value,
}

fn segment_path(root: &Path, topic: &str, seq: u32) -> PathBuf {
    root.join(format!("{topic}.{seq:08}.jsonl"))
}

/// List existing segment sequence numbers for a topic, ascending.
pub fn list_segments(root: &Path, topic: &str) -> Result<Vec<u32>, StorageError> {
    let prefix = format!("{topic}.");
    let mut seqs = Vec::new();
    if !root.exists() {
        return Ok(seqs);
    }
    let entries = std::fs::read_dir(root).map_err(|e| StorageError::Io {
        path: root.display().to_string(),
        source: e,
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| StorageError::Io {
            path: root.display().to_string(),
            source: e,
        })?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(rest) = name.strip_prefix(&prefix) {
            if let Some(seq_str) = rest.strip_suffix(".jsonl") {
                if let Ok(seq) = seq_str.parse::<u32>() {
                    seqs.push(seq);
                }
            }
        }
    }
    seqs.sort_unstable();
    Ok(seqs)
}

/// Read a segment file, tolerating a truncated final line (tail corruption
/// from a crash mid-write): the bad tail is dropped and logged, not
/// propagated as an error, per the WAL invariant that this must never crash
/// the process.
pub fn read_segment(path: &Path) -> Result<Vec<WalRecord>, StorageError> {
    let file = File::open(path).map_err(|e| StorageError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();
    let mut byte_offset: u64 = 0;
    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<WalRecord>(&line) {
            Ok(record) => {
                byte_offset += line.len() as u64 + 1;
                records.push(record);
            }
            Err(_) => {
                tracing::warn!(
                    path = %path.display(),
                    byte_offset,
                    "truncating WAL segment at corrupt tail line"
                );
                break;
            }
        }
    }
    Ok(records)
}

/// The single writer for a topic's active segment. Rotation is driven by
/// byte or line count, checked on every append.
pub struct WalWriter {
    root: PathBuf,
    topic: String,
    seq: u32,
    file: File,
    bytes_written: u64,
    lines_written: u64,
    rotate_bytes: u64,
    next_offset: u64,
}

impl WalWriter {
    /// Open (or create) the active segment for `topic`, resuming offsets
    /// from the highest existing segment's last record.
    pub fn open(root: impl Into<PathBuf>, topic: impl Into<String>, rotate_bytes: u64) -> Result<Self, StorageError> {
        let root = root.into();
        let topic = topic.into();
        std::fs::create_dir_all(&root).map_err(|e| StorageError::Io {
            path: root.display().to_string(),
            source: e,
        })?;
        let seqs = list_segments(&root, &topic)?;
        let seq = seqs.last().copied().unwrap_or(0);
        let path = segment_path(&root, &topic, seq);
        let mut next_offset = 0u64;
        if path.exists() {
            let existing = read_segment(&path)?;
            if let Some(last) = existing.last() {
                next_offset = last.offset + 1;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StorageError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
        let bytes_written = file.metadata().map(|m| m.len()).unwrap_or(0);
        Ok(Self {
            root,
            topic,
            seq,
            file,
            bytes_written,
            lines_written: next_offset,
            rotate_bytes,
            next_offset,
        })
    }

    pub fn current_segment(&self) -> u32 {
        self.seq
    }

    /// Append one record, fsync-ing per `fsync` (callers decide batching).
    /// Returns the offset assigned to this record.
    pub fn append(&mut self, meta: EventMeta, payload: serde_json::Value, fsync: bool) -> Result<u64, StorageError> {
        if self.bytes_written >= self.rotate_bytes {
            self.rotate()?;
        }
        let offset = self.next_offset;
        let record = WalRecord { offset, meta, payload };
        let mut line = serde_json::to_vec(&record).map_err(StorageError::Serialization)?;
        line.push(b'\n');
        self.file.write_all(&line).map_err(|e| StorageError::Io {
            path: segment_path(&self.root, &self.topic, self.seq).display().to_string(),
            source: e,
        })?;
        if fsync {
            self.file.sync_data().map_err(|e| StorageError::Io {
                path: segment_path(&self.root, &self.topic, self.seq).display().to_string(),
                source: e,
            })?;
        }
        self.bytes_written += line.len() as u64;
        self.lines_written += 1;
        self.next_offset += 1;
        Ok(offset)
    }

    pub fn flush(&mut self) -> Result<(), StorageError> {
        self.file.sync_data().map_err(|e| StorageError::Io {
            path: segment_path(&self.root, &self.topic, self.seq).display().to_string(),
            source: e,
        })
    }

    fn rotate(&mut self) -> Result<(), StorageError> {
        self.flush()?;
        self.seq += 1;
        let path = segment_path(&self.root, &self.topic, self.seq);
        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StorageError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
        self.bytes_written = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinlog_core::envelope::{Actor, Band, EventMeta, EventType, Hashes, Qos};
    use kinlog_core::ids::{ActorDeviceId, ActorPersonId, EntityIdType, EventId, SpaceId, TraceId};

    fn sample_meta() -> EventMeta {
        EventMeta {
            event_id: EventId::generate(),
            topic: "episodic.event.recorded".to_string(),
            event_type: EventType::new("HIPPO_ENCODE"),
            space_id: SpaceId::now_v7(),
            ts: 0,
            actor: Actor::new(ActorPersonId::now_v7(), ActorDeviceId::now_v7()),
            band: Band::Green,
            obligations: vec![],
            policy_version: "v1".to_string(),
            qos: Qos::new(0.5),
            hashes: Hashes { payload_sha256: [0u8; 32] },
            signature: None,
            trace_id: TraceId::now_v7(),
            idempotency_key: None,
            ttl_ms: None,
            mls_group: None,
        }
    }

    #[test]
    fn appended_offsets_are_monotonically_increasing() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = WalWriter::open(dir.path(), "topic.a", 1024 * 1024).unwrap();
        let a = writer.append(sample_meta(), serde_json::json!({"n": 1}), true).unwrap();
        let b = writer.append(sample_meta(), serde_json::json!({"n": 2}), true).unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 1);
    }

    #[test]
    fn reopening_resumes_offsets_from_last_record() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut writer = WalWriter::open(dir.path(), "topic.a", 1024 * 1024).unwrap();
            writer.append(sample_meta(), serde_json::json!({"n": 1}), true).unwrap();
            writer.append(sample_meta(), serde_json::json!({"n": 2}), true).unwrap();
        }
        let mut writer = WalWriter::open(dir.path(), "topic.a", 1024 * 1024).unwrap();
        let next = writer.append(sample_meta(), serde_json::json!({"n": 3}), true).unwrap();
        assert_eq!(next, 2);
    }

    #[test]
    fn rotation_creates_a_new_segment_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = WalWriter::open(dir.path(), "topic.a", 1).unwrap();
        writer.append(sample_meta(), serde_json::json!({"n": 1}), true).unwrap();
        writer.append(sample_meta(), serde_json::json!({"n": 2}), true).unwrap();
        assert!(writer.current_segment() >= 1);
    }

    #[test]
    fn truncated_tail_line_is_dropped_not_propagated_as_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topic.a.00000000.jsonl");
        let mut f = File::create(&path).unwrap();
        let record = WalRecord {
            offset: 0,
            meta: sample_meta(),
            payload: serde_json::json!({"n": 1}),
        };
        writeln!(f, "{}", serde_json::to_string(&record).unwrap()).unwrap();
        write!(f, "{{\"offset\": 1, \"meta\"").unwrap();
        drop(f);
        let records = read_segment(&path).unwrap();
        assert_eq!(records.len(), 1);
    }

    proptest::proptest! {
        #[test]
        fn offsets_are_strictly_increasing_for_any_append_count(count in 1usize..50) {
            let dir = tempfile::tempdir().unwrap();
            let mut writer = WalWriter::open(dir.path(), "topic.a", 1024 * 1024).unwrap();
            let mut last: Option<u64> = None;
            for n in 0..count {
                let offset = writer.append(sample_meta(), serde_json::json!({"n": n}), true).unwrap();
                if let Some(prev) = last {
                    proptest::prop_assert_eq!(offset, prev + 1);
                } else {
                    proptest::prop_assert_eq!(offset, 0);
                }
                last = Some(offset);
            }
        }
    }
}

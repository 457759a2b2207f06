//! Per-`(topic, group)` committed-offset store. A commit writes a temp
//! file, fsyncs it, then renames over the live file, so a crash mid-commit
//! never leaves a torn offset record on disk.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use kinlog_core::error::StorageError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffsetRecord {
    pub committed: u64,
    pub segment: u32,
    pub ts: DateTime<Utc>,
}

fn offset_path(root: &Path, topic: &str, group: &str) -> PathBuf {
    root.join(format!("{topic}__{group}.json"))
}

pub struct OffsetStore {
    root: PathBuf,
}

impl OffsetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn load(&self, topic: &str, group: &str) -> Result<Option<OffsetRecord>, StorageError> {
        let path = offset_path(&self.root, topic, group);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path).map_err(|e| StorageError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let record: OffsetRecord = serde_json::from_str(&text).map_err(StorageError::Serialization)?;
        Ok(Some(record))
    }

    /// Commit `(topic, group)` to `offset` atomically.
    pub fn commit(&self, topic: &str, group: &str, offset: u64, segment: u32) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).map_err(|e| StorageError::Io {
            path: self.root.display().to_string(),
            source: e,
        })?;
        let record = OffsetRecord {
            committed: offset,
            segment,
            ts: Utc::now(),
        };
        let body = serde_json::to_vec(&record).map_err(StorageError::Serialization)?;
        let final_path = offset_path(&self.root, topic, group);
        let tmp_path = self.root.join(format!("{topic}__{group}.json.tmp"));
        {
            let mut tmp = File::create(&tmp_path).map_err(|e| StorageError::Io {
                path: tmp_path.display().to_string(),
                source: e,
            })?;
            tmp.write_all(&body).map_err(|e| StorageError::Io {
                path: tmp_path.display().to_string(),
                source: e,
            })?;
            tmp.sync_all().map_err(|e| StorageError::Io {
                path: tmp_path.display().to_string(),
                source: e,
            })?;
        }
        fs::rename(&tmp_path, &final_path).map_err(|e| StorageError::Io {
            path: final_path.display().to_string(),
            source: e,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = OffsetStore::new(dir.path());
        store.commit("topic.a", "group-1", 5, 0).unwrap();
        let record = store.load("topic.a", "group-1").unwrap().unwrap();
        assert_eq!(record.committed, 5);
        assert_eq!(record.segment, 0);
    }

    #[test]
    fn load_of_unknown_group_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = OffsetStore::new(dir.path());
        assert!(store.load("topic.a", "nobody").unwrap().is_none());
    }

    #[test]
    fn repeated_commits_advance_the_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let store = OffsetStore::new(dir.path());
        store.commit("topic.a", "group-1", 1, 0).unwrap();
        store.commit("topic.a", "group-1", 2, 0).unwrap();
        assert_eq!(store.load("topic.a", "group-1").unwrap().unwrap().committed, 2);
    }
}

//! Dead-letter queue: `<topic>.dlq.jsonl`, appended once a subscription
//! exhausts `max_retries` on an event.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use kinlog_core::envelope::Event;
use kinlog_core::error::StorageError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    pub topic: String,
    pub original_offset: u64,
    pub event: Event,
    pub first_error_ts: DateTime<Utc>,
    pub last_error_ts: DateTime<Utc>,
    pub retries: u32,
    pub final_error: String,
}

fn dlq_path(root: &Path, topic: &str) -> PathBuf {
    root.join(format!("{topic}.dlq.jsonl"))
}

pub fn append(root: &Path, record: &DeadLetterRecord) -> Result<(), StorageError> {
    std::fs::create_dir_all(root).map_err(|e| StorageError::Io {
        path: root.display().to_string(),
        source: e,
    })?;
    let path = dlq_path(root, &record.topic);
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| StorageError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
    let mut line = serde_json::to_vec(record).map_err(StorageError::Serialization)?;
    line.push(b'\n');
    file.write_all(&line).map_err(|e| StorageError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    file.sync_data().map_err(|e| StorageError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

/// Total record count across every topic's DLQ file under `root`, used by
/// `EventBusCore::health` to decide whether the bus is degraded. Missing
/// directories (no DLQ writes have ever happened) count as zero rather than
/// an error.
pub fn count_all(root: &Path) -> Result<u64, StorageError> {
    if !root.exists() {
        return Ok(0);
    }
    let mut total = 0u64;
    for entry in std::fs::read_dir(root).map_err(|e| StorageError::Io {
        path: root.display().to_string(),
        source: e,
    })? {
        let entry = entry.map_err(|e| StorageError::Io {
            path: root.display().to_string(),
            source: e,
        })?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        let text = std::fs::read_to_string(&path).map_err(|e| StorageError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        total += text.lines().filter(|l| !l.is_empty()).count() as u64;
    }
    Ok(total)
}

pub fn read_all(root: &Path, topic: &str) -> Result<Vec<DeadLetterRecord>, StorageError> {
    let path = dlq_path(root, topic);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = std::fs::read_to_string(&path).map_err(|e| StorageError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    text.lines()
        .filter(|l| !l.is_empty())
        .map(|l| serde_json::from_str(l).map_err(StorageError::Serialization))
        .collect()
}

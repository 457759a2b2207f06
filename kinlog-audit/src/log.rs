//! Append-only receipt log: persists a `ReceiptChain`'s output to a JSONL
//! file and reloads it on restart, the same fsync-before-return WAL
//! discipline `kinlog-bus`/`kinlog-episodic` use for their own logs.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use kinlog_core::error::StorageError;

use crate::receipt::{verify_chain, Receipt, ReceiptChain, ReceiptSubject};

pub struct AuditLog {
    file: File,
    chain: ReceiptChain,
}

impl AuditLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path: PathBuf = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Io {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        let existing = read_all(&path)?;
        verify_chain(&existing).map_err(|i| StorageError::TailCorruption {
            path: path.display().to_string(),
            byte_offset: i as u64,
        })?;
        let chain = match existing.last() {
            Some(last) => ReceiptChain::resume_from(last),
            None => ReceiptChain::new(),
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StorageError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
        Ok(Self { file, chain })
    }

    pub fn with_signing_key(mut self, key: Vec<u8>) -> Self {
        self.chain = std::mem::take(&mut self.chain).with_signing_key(key);
        self
    }

    pub fn append(&mut self, subject: ReceiptSubject, payload: &serde_json::Value, ts: i64) -> Result<Receipt, StorageError> {
        let receipt = self.chain.append(subject, payload, ts);
        let mut line = serde_json::to_vec(&receipt)?;
        line.push(b'\n');
        self.file.write_all(&line).map_err(|e| StorageError::Io {
            path: "<audit log>".to_string(),
            source: e,
        })?;
        self.file.sync_data().map_err(|e| StorageError::Io {
            path: "<audit log>".to_string(),
            source: e,
        })?;
        Ok(receipt)
    }
}

fn read_all(path: &Path) -> Result<Vec<Receipt>, StorageError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path).map_err(|e| StorageError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let reader = BufReader::new(file);
    let mut receipts = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| StorageError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Receipt>(&line) {
            Ok(r) => receipts.push(r),
            Err(_) => {
                tracing::warn!(path = %path.display(), "truncated audit log tail, stopping replay here");
                break;
            }
        }
    }
    Ok(receipts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn appended_receipts_survive_a_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.jsonl");
        {
            let mut log = AuditLog::open(&path).unwrap();
            log.append(
                ReceiptSubject::GateDecision {
                    request_id: "r1".to_string(),
                    action: "ADMIT".to_string(),
                },
                &serde_json::json!({"a": 1}),
                0,
            )
            .unwrap();
        }
        let mut log = AuditLog::open(&path).unwrap();
        let r2 = log
            .append(
                ReceiptSubject::BusCommit {
                    topic: "t".to_string(),
                    segment: 0,
                    offset: 1,
                },
                &serde_json::json!({"a": 2}),
                1,
            )
            .unwrap();
        assert_eq!(r2.seq, 1);
    }

    #[test]
    fn empty_log_resumes_as_a_fresh_chain() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.jsonl");
        let mut log = AuditLog::open(&path).unwrap();
        let r = log
            .append(
                ReceiptSubject::GateDecision {
                    request_id: "r1".to_string(),
                    action: "ADMIT".to_string(),
                },
                &serde_json::json!({}),
                0,
            )
            .unwrap();
        assert_eq!(r.seq, 0);
    }
}

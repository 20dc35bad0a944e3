use crate::common::{GateError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

/// Terminal state of an access attempt as recorded in the log.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessStatus {
    Granted,
    Denied,
    Unknown,
}

impl AccessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessStatus::Granted => "Granted",
            AccessStatus::Denied => "Denied",
            AccessStatus::Unknown => "Unknown",
        }
    }
}

pub const UNKNOWN_IDENTITY: &str = "Unknown";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub log_id: String,
    pub timestamp: DateTime<Utc>,
    pub identity_name: String,
    pub identity_id: String,
    pub status: AccessStatus,
}

impl AuditEntry {
    pub fn new(identity_name: &str, identity_id: &str, status: AccessStatus) -> Self {
        Self {
            log_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            identity_name: identity_name.to_string(),
            identity_id: identity_id.to_string(),
            status,
        }
    }

    pub fn unknown(status: AccessStatus) -> Self {
        Self::new(UNKNOWN_IDENTITY, UNKNOWN_IDENTITY, status)
    }
}

/// Append-only access log.
pub trait AuditSink: Send + Sync {
    fn append(&self, entry: &AuditEntry) -> Result<()>;
}

/// One JSON object per line in `<logs_dir>/<log_name>.jsonl`.
pub struct JsonlAuditLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlAuditLog {
    pub fn open(logs_dir: &Path, log_name: &str) -> Result<Self> {
        fs::create_dir_all(logs_dir)?;
        Ok(Self {
            path: logs_dir.join(format!("{}.jsonl", log_name)),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The newest `limit` entries, oldest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(&self.path)?;
        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!("Skipping unreadable audit line: {}", e),
            }
        }

        let skip = entries.len().saturating_sub(limit);
        Ok(entries.split_off(skip))
    }
}

impl AuditSink for JsonlAuditLog {
    fn append(&self, entry: &AuditEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _guard = self.write_lock
            .lock()
            .map_err(|_| GateError::Storage("Audit log lock poisoned".into()))?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn appends_and_reads_back_in_order() {
        let tmp = TempDir::new().unwrap();
        let log = JsonlAuditLog::open(tmp.path(), "access-log").unwrap();

        log.append(&AuditEntry::new("Ana Restrepo", "1036", AccessStatus::Granted)).unwrap();
        log.append(&AuditEntry::unknown(AccessStatus::Denied)).unwrap();
        log.append(&AuditEntry::unknown(AccessStatus::Unknown)).unwrap();

        let all = log.recent(10).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].status, AccessStatus::Granted);
        assert_eq!(all[1].identity_name, "Unknown");

        let last = log.recent(1).unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].status, AccessStatus::Unknown);
    }

    #[test]
    fn missing_log_reads_empty() {
        let tmp = TempDir::new().unwrap();
        let log = JsonlAuditLog::open(tmp.path(), "none").unwrap();
        assert!(log.recent(5).unwrap().is_empty());
    }

    #[test]
    fn log_ids_are_unique() {
        let a = AuditEntry::unknown(AccessStatus::Denied);
        let b = AuditEntry::unknown(AccessStatus::Denied);
        assert_ne!(a.log_id, b.log_id);
        assert!(Uuid::parse_str(&a.log_id).is_ok());
    }
}

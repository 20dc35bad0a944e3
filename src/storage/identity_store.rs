use crate::common::{GateError, Result};
use crate::core::validation::sanitize_external_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

const STORAGE_VERSION: u32 = 1;

/// One enrolled person, keyed by the template key the face capability issued.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IdentityRecord {
    pub template_key: String,
    pub first_name: String,
    pub last_name: String,
    /// The id exactly as submitted, before sanitization.
    pub external_id: String,
    pub city: String,
    pub created_at: DateTime<Utc>,
}

impl IdentityRecord {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}

#[derive(Serialize, Deserialize)]
struct StoredIdentity {
    version: u32,
    record: IdentityRecord,
}

/// Keyed record store. Records are insert-only: a template key is written once.
pub trait IdentityStore: Send + Sync {
    fn put(&self, record: &IdentityRecord) -> Result<()>;
    fn get(&self, template_key: &str) -> Result<Option<IdentityRecord>>;
}

/// One bincode file per template key.
pub struct FileIdentityStore {
    data_dir: PathBuf,
}

impl FileIdentityStore {
    pub fn new(data_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    fn record_path(&self, template_key: &str) -> Result<PathBuf> {
        if template_key.is_empty() || sanitize_external_id(template_key) != template_key {
            return Err(GateError::Storage(format!("Invalid template key: {:?}", template_key)));
        }
        Ok(self.data_dir.join(format!("{}.bincode", template_key)))
    }
}

impl IdentityStore for FileIdentityStore {
    fn put(&self, record: &IdentityRecord) -> Result<()> {
        let path = self.record_path(&record.template_key)?;
        let encoded = bincode::serialize(&StoredIdentity {
            version: STORAGE_VERSION,
            record: record.clone(),
        })?;

        // create_new keeps the key immutable once written
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(GateError::DuplicateTemplateKey(record.template_key.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(&encoded)?;
        file.sync_all()?;

        tracing::debug!("Stored identity record {}", record.template_key);
        Ok(())
    }

    fn get(&self, template_key: &str) -> Result<Option<IdentityRecord>> {
        let path = self.record_path(template_key)?;
        if !path.exists() {
            return Ok(None);
        }

        let data = fs::read(path)?;
        let stored: StoredIdentity = bincode::deserialize(&data)
            .map_err(|e| GateError::Storage(format!("Failed to deserialize {}: {}", template_key, e)))?;

        if stored.version > STORAGE_VERSION {
            return Err(GateError::Storage(format!(
                "Record {} has unsupported version {}", template_key, stored.version
            )));
        }

        Ok(Some(stored.record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(key: &str) -> IdentityRecord {
        IdentityRecord {
            template_key: key.to_string(),
            first_name: "Ana".into(),
            last_name: "Restrepo".into(),
            external_id: "1.036 555".into(),
            city: "Medellin".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn put_then_get_returns_record() {
        let tmp = TempDir::new().unwrap();
        let store = FileIdentityStore::new(tmp.path().to_path_buf()).unwrap();
        let rec = record("a1b2c3d4-0000-4000-8000-000000000001");

        store.put(&rec).unwrap();
        assert_eq!(store.get(&rec.template_key).unwrap(), Some(rec));
    }

    #[test]
    fn missing_key_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = FileIdentityStore::new(tmp.path().to_path_buf()).unwrap();
        assert_eq!(store.get("unknown-key").unwrap(), None);
    }

    #[test]
    fn template_keys_are_immutable() {
        let tmp = TempDir::new().unwrap();
        let store = FileIdentityStore::new(tmp.path().to_path_buf()).unwrap();
        let rec = record("k-1");
        store.put(&rec).unwrap();

        let mut changed = rec.clone();
        changed.first_name = "Someone Else".into();
        let err = store.put(&changed).unwrap_err();
        assert!(matches!(err, GateError::DuplicateTemplateKey(_)));
        assert_eq!(store.get("k-1").unwrap().unwrap().first_name, "Ana");
    }

    #[test]
    fn rejects_path_like_keys() {
        let tmp = TempDir::new().unwrap();
        let store = FileIdentityStore::new(tmp.path().to_path_buf()).unwrap();
        assert!(store.get("../etc/passwd").is_err());
        assert!(store.put(&record("")).is_err());
    }

    #[test]
    fn display_name_joins_names() {
        assert_eq!(record("k").display_name(), "Ana Restrepo");
    }
}

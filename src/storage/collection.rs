use crate::common::{GateError, Result};
use crate::core::recognizer::Embedding;
use crate::core::validation::sanitize_external_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use uuid::Uuid;

const COLLECTION_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CollectionFace {
    pub template_key: String,
    pub external_id: String,
    pub embedding: Embedding,
    pub indexed_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CollectionData {
    pub version: u32,
    pub collection_id: String,
    pub created_at: DateTime<Utc>,
    pub faces: Vec<CollectionFace>,
}

/// Face-template collections for the local capability, one bincode file each.
pub struct CollectionStore {
    data_dir: PathBuf,
    // Serializes read-modify-write of collection files
    write_lock: Mutex<()>,
}

impl CollectionStore {
    pub fn new(data_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&data_dir)?;
        Ok(Self {
            data_dir,
            write_lock: Mutex::new(()),
        })
    }

    fn collection_path(&self, collection_id: &str) -> Result<PathBuf> {
        if collection_id.is_empty() || sanitize_external_id(collection_id) != collection_id {
            return Err(GateError::Storage(format!("Invalid collection id: {:?}", collection_id)));
        }
        Ok(self.data_dir.join(format!("{}.bincode", collection_id)))
    }

    /// Creates an empty collection. Returns false when it already exists.
    pub fn create(&self, collection_id: &str) -> Result<bool> {
        let _guard = self.lock()?;
        let path = self.collection_path(collection_id)?;
        if path.exists() {
            return Ok(false);
        }

        self.write(&CollectionData {
            version: COLLECTION_VERSION,
            collection_id: collection_id.to_string(),
            created_at: Utc::now(),
            faces: Vec::new(),
        })?;
        tracing::info!("Created face collection {}", collection_id);
        Ok(true)
    }

    pub fn load(&self, collection_id: &str) -> Result<Option<CollectionData>> {
        let path = self.collection_path(collection_id)?;
        if !path.exists() {
            return Ok(None);
        }

        let data = fs::read(path)?;
        let collection: CollectionData = bincode::deserialize(&data)
            .map_err(|e| GateError::Storage(format!("Failed to deserialize collection {}: {}", collection_id, e)))?;
        Ok(Some(collection))
    }

    /// Appends an embedding under a freshly issued template key.
    /// Returns `None` when the collection does not exist.
    pub fn add_face(&self, collection_id: &str, external_id: &str, embedding: Embedding) -> Result<Option<String>> {
        let _guard = self.lock()?;
        let mut collection = match self.load(collection_id)? {
            Some(c) => c,
            None => return Ok(None),
        };

        let template_key = generate_template_key();
        collection.faces.push(CollectionFace {
            template_key: template_key.clone(),
            external_id: external_id.to_string(),
            embedding,
            indexed_at: Utc::now(),
        });
        self.write(&collection)?;

        Ok(Some(template_key))
    }

    fn write(&self, collection: &CollectionData) -> Result<()> {
        let path = self.collection_path(&collection.collection_id)?;
        let encoded = bincode::serialize(collection)?;

        // Write to a sibling file first so readers never see a partial collection
        let tmp_path = path.with_extension("bincode.tmp");
        fs::write(&tmp_path, encoded)?;
        fs::rename(tmp_path, path)?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| GateError::Storage("Collection lock poisoned".into()))
    }
}

/// Random v4 UUID, hyphenated.
pub fn generate_template_key() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn add_face_requires_existing_collection() {
        let tmp = TempDir::new().unwrap();
        let store = CollectionStore::new(tmp.path().to_path_buf()).unwrap();
        assert_eq!(store.add_face("employees", "1036", vec![1.0, 0.0]).unwrap(), None);

        assert!(store.create("employees").unwrap());
        assert!(!store.create("employees").unwrap());

        let key = store.add_face("employees", "1036", vec![1.0, 0.0]).unwrap().unwrap();
        let loaded = store.load("employees").unwrap().unwrap();
        assert_eq!(loaded.faces.len(), 1);
        assert_eq!(loaded.faces[0].template_key, key);
        assert_eq!(loaded.faces[0].external_id, "1036");
    }

    #[test]
    fn template_keys_are_distinct() {
        let a = generate_template_key();
        let b = generate_template_key();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
        assert_eq!(sanitize_external_id(&a), a);
        assert_eq!(Uuid::parse_str(&a).unwrap().get_version_num(), 4);
    }
}

//! Recording fakes for every collaborator the pipelines talk to.
#![allow(dead_code)]

use facegate::core::{
    BoundingBox, CapabilityError, CapabilityResult, FaceCapability, FaceDetail, FaceMatch, IndexParams,
    IndexedFace, SearchParams,
};
use facegate::sinks::{Alert, AlertChannel, AuditEntry, AuditSink, Metric, MetricsSink};
use facegate::storage::{ArtifactStore, IdentityRecord, IdentityStore};
use facegate::{Collaborators, GateError, Result};
use image::{DynamicImage, ImageOutputFormat, RgbImage};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const COLLECTION: &str = "employees";

fn injected(what: &str) -> GateError {
    GateError::Storage(format!("injected {} failure", what))
}

/// A small valid PNG.
pub fn png() -> Vec<u8> {
    let img = RgbImage::from_fn(32, 32, |x, y| image::Rgb([(x * 8) as u8, (y * 8) as u8, 128]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .unwrap();
    bytes
}

pub fn face() -> FaceDetail {
    FaceDetail {
        bounding_box: BoundingBox { x1: 4.0, y1: 4.0, x2: 28.0, y2: 28.0 },
        confidence: 0.98,
    }
}

/// Face capability driven by a script. Indexed faces become search
/// candidates at 99.0 similarity.
#[derive(Default)]
pub struct FakeFaces {
    pub face_count: Mutex<usize>,
    pub matches: Mutex<Vec<FaceMatch>>,
    pub error: Mutex<Option<CapabilityError>>,
    pub collections: Mutex<HashSet<String>>,
    pub indexed: Mutex<Vec<(String, String)>>,
    pub searches: Mutex<usize>,
}

impl FakeFaces {
    pub fn with_collection() -> Self {
        let faces = Self::default();
        faces.collections.lock().unwrap().insert(COLLECTION.to_string());
        *faces.face_count.lock().unwrap() = 1;
        faces
    }

    pub fn set_face_count(&self, count: usize) {
        *self.face_count.lock().unwrap() = count;
    }

    pub fn add_match(&self, template_key: &str, similarity: f32) {
        self.matches.lock().unwrap().push(FaceMatch {
            template_key: template_key.to_string(),
            similarity,
        });
    }

    pub fn fail_with(&self, error: CapabilityError) {
        *self.error.lock().unwrap() = Some(error);
    }

    pub fn search_count(&self) -> usize {
        *self.searches.lock().unwrap()
    }

    fn check_error(&self) -> CapabilityResult<()> {
        match self.error.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn check_collection(&self, collection_id: &str) -> CapabilityResult<()> {
        if self.collections.lock().unwrap().contains(collection_id) {
            Ok(())
        } else {
            Err(CapabilityError::CollectionNotFound(collection_id.to_string()))
        }
    }
}

impl FaceCapability for FakeFaces {
    fn detect_faces(&self, _image: &DynamicImage) -> CapabilityResult<Vec<FaceDetail>> {
        self.check_error()?;
        Ok(vec![face(); *self.face_count.lock().unwrap()])
    }

    fn search_face(
        &self,
        _image: &DynamicImage,
        collection_id: &str,
        params: SearchParams,
    ) -> CapabilityResult<Vec<FaceMatch>> {
        *self.searches.lock().unwrap() += 1;
        self.check_error()?;
        self.check_collection(collection_id)?;

        let mut matches: Vec<FaceMatch> = self
            .matches
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.similarity >= params.min_similarity)
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        matches.truncate(params.max_candidates);
        Ok(matches)
    }

    fn index_face(
        &self,
        _image: &DynamicImage,
        collection_id: &str,
        external_id: &str,
        _params: IndexParams,
    ) -> CapabilityResult<Vec<IndexedFace>> {
        self.check_error()?;
        self.check_collection(collection_id)?;
        if *self.face_count.lock().unwrap() == 0 {
            return Ok(Vec::new());
        }

        let mut indexed = self.indexed.lock().unwrap();
        let template_key = format!("face-{:04}", indexed.len() + 1);
        indexed.push((template_key.clone(), external_id.to_string()));
        self.add_match(&template_key, 99.0);
        Ok(vec![IndexedFace { template_key }])
    }
}

#[derive(Default)]
pub struct MemoryIdentities {
    pub records: Mutex<HashMap<String, IdentityRecord>>,
    pub fail_get: Mutex<bool>,
    pub fail_put: Mutex<bool>,
}

impl MemoryIdentities {
    pub fn insert(&self, template_key: &str, first_name: &str, last_name: &str, external_id: &str) {
        self.records.lock().unwrap().insert(
            template_key.to_string(),
            IdentityRecord {
                template_key: template_key.to_string(),
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                external_id: external_id.to_string(),
                city: "Quito".to_string(),
                created_at: chrono::Utc::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

impl IdentityStore for MemoryIdentities {
    fn put(&self, record: &IdentityRecord) -> Result<()> {
        if *self.fail_put.lock().unwrap() {
            return Err(injected("identity put"));
        }
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&record.template_key) {
            return Err(GateError::DuplicateTemplateKey(record.template_key.clone()));
        }
        records.insert(record.template_key.clone(), record.clone());
        Ok(())
    }

    fn get(&self, template_key: &str) -> Result<Option<IdentityRecord>> {
        if *self.fail_get.lock().unwrap() {
            return Err(injected("identity get"));
        }
        Ok(self.records.lock().unwrap().get(template_key).cloned())
    }
}

#[derive(Default)]
pub struct RecordingArtifacts {
    pub stored: Mutex<Vec<(String, Vec<u8>)>>,
    pub fail: Mutex<bool>,
}

impl RecordingArtifacts {
    pub fn keys(&self) -> Vec<String> {
        self.stored.lock().unwrap().iter().map(|(k, _)| k.clone()).collect()
    }
}

impl ArtifactStore for RecordingArtifacts {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        if *self.fail.lock().unwrap() {
            return Err(injected("artifact upload"));
        }
        self.stored.lock().unwrap().push((key.to_string(), bytes.to_vec()));
        Ok(())
    }

    fn presign(&self, key: &str, ttl: Duration) -> Result<String> {
        Ok(format!("https://artifacts.test/unknown-faces/{}?ttl={}", key, ttl.as_secs()))
    }
}

#[derive(Default)]
pub struct RecordingAlerts {
    pub published: Mutex<Vec<Alert>>,
    pub fail: Mutex<bool>,
}

impl AlertChannel for RecordingAlerts {
    fn publish(&self, alert: &Alert) -> Result<()> {
        if *self.fail.lock().unwrap() {
            return Err(injected("alert publish"));
        }
        self.published.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAudit {
    pub entries: Mutex<Vec<AuditEntry>>,
    pub fail: Mutex<bool>,
}

impl AuditSink for RecordingAudit {
    fn append(&self, entry: &AuditEntry) -> Result<()> {
        if *self.fail.lock().unwrap() {
            return Err(injected("audit write"));
        }
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingMetrics {
    pub emitted: Mutex<Vec<Metric>>,
    pub fail: Mutex<bool>,
}

impl MetricsSink for RecordingMetrics {
    fn emit(&self, metric: Metric) -> Result<()> {
        if *self.fail.lock().unwrap() {
            return Err(injected("metric emit"));
        }
        self.emitted.lock().unwrap().push(metric);
        Ok(())
    }
}

/// One of every fake, plus the `Collaborators` bundle pointing at them.
pub struct Harness {
    pub faces: Arc<FakeFaces>,
    pub identities: Arc<MemoryIdentities>,
    pub artifacts: Arc<RecordingArtifacts>,
    pub alerts: Arc<RecordingAlerts>,
    pub audit: Arc<RecordingAudit>,
    pub metrics: Arc<RecordingMetrics>,
    audit_enabled: bool,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            faces: Arc::new(FakeFaces::with_collection()),
            identities: Arc::new(MemoryIdentities::default()),
            artifacts: Arc::new(RecordingArtifacts::default()),
            alerts: Arc::new(RecordingAlerts::default()),
            audit: Arc::new(RecordingAudit::default()),
            metrics: Arc::new(RecordingMetrics::default()),
            audit_enabled: true,
        }
    }

    pub fn without_audit() -> Self {
        Self { audit_enabled: false, ..Self::new() }
    }

    pub fn collaborators(&self) -> Collaborators {
        let audit: Option<Arc<dyn AuditSink>> = if self.audit_enabled {
            Some(self.audit.clone())
        } else {
            None
        };

        Collaborators {
            faces: self.faces.clone(),
            identities: self.identities.clone(),
            artifacts: self.artifacts.clone(),
            alerts: self.alerts.clone(),
            audit,
            metrics: self.metrics.clone(),
        }
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.entries.lock().unwrap().clone()
    }

    pub fn metrics(&self) -> Vec<Metric> {
        self.metrics.emitted.lock().unwrap().clone()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.published.lock().unwrap().clone()
    }

    /// True when nothing was audited, alerted, metered or stored.
    pub fn no_side_effects(&self) -> bool {
        self.audit_entries().is_empty()
            && self.metrics().is_empty()
            && self.alerts().is_empty()
            && self.artifacts.keys().is_empty()
    }
}

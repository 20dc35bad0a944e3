use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::common::error::{GateError, Result};
use crate::common::paths::config_candidates;
use crate::core::validation::sanitize_external_id;

/// Minimum match confidence (0-100) a search candidate needs to open the gate.
pub const SIMILARITY_THRESHOLD: f32 = 95.0;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default)]
    pub models: ModelConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub recognizer: RecognizerConfig,
    #[serde(default)]
    pub enrollment: EnrollmentConfig,
    #[serde(default)]
    pub artifacts: ArtifactConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
    #[serde(default)]
    pub service: ServiceConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// Audit and meter zero-face / multi-face attempts as `Unknown`.
    #[serde(default = "default_true")]
    pub record_unknown_outcomes: bool,
}

fn default_similarity_threshold() -> f32 { SIMILARITY_THRESHOLD }
fn default_max_candidates() -> usize { 1 }
fn default_true() -> bool { true }

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            max_candidates: default_max_candidates(),
            record_unknown_outcomes: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CollectionConfig {
    #[serde(default = "default_collection_id")]
    pub id: String,
}

fn default_collection_id() -> String { "employees".to_string() }

impl Default for CollectionConfig {
    fn default() -> Self {
        Self { id: default_collection_id() }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_detector_path")]
    pub detector_path: PathBuf,
    #[serde(default = "default_recognizer_path")]
    pub recognizer_path: PathBuf,
}

fn default_detector_path() -> PathBuf { PathBuf::from("models/face_detector.onnx") }
fn default_recognizer_path() -> PathBuf { PathBuf::from("models/face_embedding.onnx") }

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            detector_path: default_detector_path(),
            recognizer_path: default_recognizer_path(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DetectorConfig {
    #[serde(default = "default_detector_input")]
    pub input_width: u32,
    #[serde(default = "default_detector_input")]
    pub input_height: u32,
    #[serde(default = "default_detection_confidence")]
    pub detection_confidence: f32,
}

fn default_detector_input() -> u32 { 640 }
fn default_detection_confidence() -> f32 { 0.5 }

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            input_width: default_detector_input(),
            input_height: default_detector_input(),
            detection_confidence: default_detection_confidence(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecognizerConfig {
    #[serde(default = "default_recognizer_input")]
    pub input_size: u32,
    #[serde(default = "default_normalization")]
    pub normalization_value: f32,
}

fn default_recognizer_input() -> u32 { 112 }
fn default_normalization() -> f32 { 127.5 }

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            input_size: default_recognizer_input(),
            normalization_value: default_normalization(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QualityFilter {
    Auto,
    None,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EnrollmentConfig {
    #[serde(default = "default_quality_filter")]
    pub quality_filter: QualityFilter,
    #[serde(default = "default_min_quality")]
    pub min_quality: f32,
}

fn default_quality_filter() -> QualityFilter { QualityFilter::Auto }
fn default_min_quality() -> f32 { 0.5 }

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            quality_filter: default_quality_filter(),
            min_quality: default_min_quality(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ArtifactConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_url_base")]
    pub url_base: String,
    #[serde(default = "default_url_expiry")]
    pub url_expiry_secs: u64,
    /// HMAC key for artifact URLs; a random per-process key is used when unset.
    #[serde(default)]
    pub signing_key: Option<String>,
}

fn default_bucket() -> String { "unknown-faces".to_string() }
fn default_url_base() -> String { "file:///var/lib/facegate/artifacts".to_string() }
fn default_url_expiry() -> u64 { 3600 }

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            url_base: default_url_base(),
            url_expiry_secs: default_url_expiry(),
            signing_key: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AlertConfig {
    #[serde(default = "default_alert_channel")]
    pub channel: String,
}

fn default_alert_channel() -> String { "access-alerts".to_string() }

impl Default for AlertConfig {
    fn default() -> Self {
        Self { channel: default_alert_channel() }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AuditConfig {
    /// Name of the access log; audit logging is skipped when unset.
    #[serde(default)]
    pub log_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_namespace() -> String { "BiometricAccessControl".to_string() }

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { namespace: default_namespace() }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PerformanceConfig {
    #[serde(default = "default_optimization_level")]
    pub optimization_level: u32,
}

fn default_optimization_level() -> u32 { 3 }

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self { optimization_level: default_optimization_level() }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
}

fn default_read_timeout() -> u64 { 10 }
fn default_write_timeout() -> u64 { 5 }
fn default_max_request_bytes() -> usize { 16 * 1024 * 1024 }

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            read_timeout_secs: default_read_timeout(),
            write_timeout_secs: default_write_timeout(),
            max_request_bytes: default_max_request_bytes(),
        }
    }
}

impl Config {
    /// Loads `explicit` if given, else the first existing candidate file,
    /// else built-in defaults.
    pub fn discover(explicit: Option<&Path>, dev_mode: bool) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }

        match config_candidates(dev_mode).into_iter().find(|p| p.exists()) {
            Some(path) => Self::load_from_path(&path),
            None => {
                tracing::warn!("No config file found; using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(GateError::Config(format!(
                "Config file not found: {}. Please create it from the example.", path.display()
            )));
        }

        tracing::info!("Loading config from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| GateError::Config(format!("Config parse error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Validate access policy
        if !(0.0..=100.0).contains(&self.access.similarity_threshold) {
            return Err(GateError::Config(format!(
                "Similarity threshold must be between 0 and 100, got {}",
                self.access.similarity_threshold
            )));
        }
        if self.access.max_candidates == 0 {
            return Err(GateError::Config("max_candidates must be at least 1".into()));
        }

        // Collection ids share the external id character set
        if self.collection.id.is_empty() || sanitize_external_id(&self.collection.id) != self.collection.id {
            return Err(GateError::Config(format!(
                "Collection id must be non-empty and match [A-Za-z0-9_.:-], got {:?}",
                self.collection.id
            )));
        }

        // Validate detector
        if self.detector.input_width == 0 || self.detector.input_width > 4096 {
            return Err(GateError::Config(format!(
                "Detector input width must be between 1 and 4096, got {}",
                self.detector.input_width
            )));
        }
        if self.detector.input_height == 0 || self.detector.input_height > 4096 {
            return Err(GateError::Config(format!(
                "Detector input height must be between 1 and 4096, got {}",
                self.detector.input_height
            )));
        }
        if !(0.0..=1.0).contains(&self.detector.detection_confidence) {
            return Err(GateError::Config(format!(
                "Detection confidence must be between 0.0 and 1.0, got {}",
                self.detector.detection_confidence
            )));
        }

        // Validate recognizer input size
        if self.recognizer.input_size == 0 || self.recognizer.input_size > 1024 {
            return Err(GateError::Config(format!(
                "Recognizer input size must be between 1 and 1024, got {}",
                self.recognizer.input_size
            )));
        }

        if !(0.0..=1.0).contains(&self.enrollment.min_quality) {
            return Err(GateError::Config(format!(
                "Enrollment min quality must be between 0.0 and 1.0, got {}",
                self.enrollment.min_quality
            )));
        }

        if self.artifacts.url_expiry_secs == 0 {
            return Err(GateError::Config("Artifact URL expiry must be positive".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.access.similarity_threshold, SIMILARITY_THRESHOLD);
        assert_eq!(config.access.max_candidates, 1);
        assert!(config.access.record_unknown_outcomes);
        assert_eq!(config.collection.id, "employees");
        assert_eq!(config.artifacts.url_expiry_secs, 3600);
        assert_eq!(config.enrollment.quality_filter, QualityFilter::Auto);
        assert!(config.audit.log_name.is_none());
    }

    #[test]
    fn rejects_threshold_out_of_range() {
        let err = Config::from_toml("[access]\nsimilarity_threshold = 101.0\n").unwrap_err();
        assert!(matches!(err, GateError::Config(_)));
    }

    #[test]
    fn rejects_unsafe_collection_id() {
        assert!(Config::from_toml("[collection]\nid = \"staff list\"\n").is_err());
        assert!(Config::from_toml("[collection]\nid = \"\"\n").is_err());
    }

    #[test]
    fn parses_sections() {
        let config = Config::from_toml(
            r#"
            [audit]
            log_name = "access-log"

            [enrollment]
            quality_filter = "none"

            [artifacts]
            bucket = "unmatched"
            url_expiry_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(config.audit.log_name.as_deref(), Some("access-log"));
        assert_eq!(config.enrollment.quality_filter, QualityFilter::None);
        assert_eq!(config.artifacts.bucket, "unmatched");
        assert_eq!(config.artifacts.url_expiry_secs, 60);
    }

    #[test]
    fn explicit_path_must_exist() {
        let tmp = tempfile::TempDir::new().unwrap();
        let missing = tmp.path().join("absent.toml");
        assert!(matches!(Config::discover(Some(&missing), true), Err(GateError::Config(_))));

        let present = tmp.path().join("facegate.toml");
        std::fs::write(&present, "[collection]\nid = \"staff\"\n").unwrap();
        assert_eq!(Config::discover(Some(&present), true).unwrap().collection.id, "staff");
    }
}

//! Access decision: one probe image in, one terminal outcome out.
//!
//! Steps run strictly in order (decode, detect, search, identity lookup)
//! because each result decides whether the next step runs. Side effects of
//! a terminal state are best effort; see [`best_effort`].

use crate::common::Config;
use crate::core::capability::{CapabilityError, FaceCapability, SearchParams};
use crate::core::collaborators::{best_effort, Collaborators, SideEffect};
use crate::core::validation::{decode_image, image_extension};
use crate::sinks::{AccessStatus, Alert, AuditEntry, Metric};
use crate::storage::IdentityRecord;
use chrono::Utc;
use rand::Rng;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct AccessPolicy {
    pub collection_id: String,
    pub similarity_threshold: f32,
    pub max_candidates: usize,
    pub artifact_url_ttl: Duration,
    pub record_unknown_outcomes: bool,
}

impl AccessPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            collection_id: config.collection.id.clone(),
            similarity_threshold: config.access.similarity_threshold,
            max_candidates: config.access.max_candidates,
            artifact_url_ttl: Duration::from_secs(config.artifacts.url_expiry_secs),
            record_unknown_outcomes: config.access.record_unknown_outcomes,
        }
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccessState {
    /// Zero or several faces; carries the detected count.
    Unknown(usize),
    Granted(IdentityRecord),
    Denied,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccessOutcome {
    pub state: AccessState,
    pub face_count: usize,
    /// Similarity of the best candidate, when the search returned one.
    pub match_score: Option<f32>,
    /// Signed link to the stored probe on the Denied path.
    pub artifact_url: Option<String>,
    pub degraded: Vec<SideEffect>,
}

impl AccessOutcome {
    pub fn status_code(&self) -> u16 {
        match self.state {
            AccessState::Unknown(_) => 400,
            AccessState::Granted(_) => 200,
            AccessState::Denied => 403,
        }
    }

    pub fn access_status(&self) -> AccessStatus {
        match self.state {
            AccessState::Unknown(_) => AccessStatus::Unknown,
            AccessState::Granted(_) => AccessStatus::Granted,
            AccessState::Denied => AccessStatus::Denied,
        }
    }

    pub fn message(&self) -> String {
        match &self.state {
            AccessState::Unknown(0) => "Access Denied: No face detected in the image.".to_string(),
            AccessState::Unknown(_) => "Access Denied: More than one face detected in the image.".to_string(),
            AccessState::Granted(identity) => format!(
                "Access Granted for {} (Employee ID: {})",
                identity.display_name(),
                identity.external_id
            ),
            AccessState::Denied => "Access Denied: Face not recognized.".to_string(),
        }
    }

    pub fn employee_id(&self) -> Option<&str> {
        match &self.state {
            AccessState::Granted(identity) => Some(&identity.external_id),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("probe image could not be decoded")]
    InvalidImage,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AccessError {
    pub fn status_code(&self) -> u16 {
        match self {
            AccessError::InvalidImage => 400,
            AccessError::Internal(_) => 500,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AccessError::InvalidImage => "Invalid image format",
            AccessError::Internal(_) => "Internal Server Error",
        }
    }
}

impl From<CapabilityError> for AccessError {
    fn from(e: CapabilityError) -> Self {
        match e {
            CapabilityError::InvalidImage => AccessError::InvalidImage,
            other => AccessError::Internal(other.to_string()),
        }
    }
}

pub struct AccessPipeline {
    collaborators: Collaborators,
    policy: AccessPolicy,
}

impl AccessPipeline {
    pub fn new(collaborators: Collaborators, policy: AccessPolicy) -> Self {
        Self { collaborators, policy }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    pub fn decide(&self, probe: &[u8]) -> Result<AccessOutcome, AccessError> {
        let image = decode_image(probe).ok_or(AccessError::InvalidImage)?;
        let faces: &dyn FaceCapability = self.collaborators.faces.as_ref();

        let face_count = faces.detect_faces(&image)?.len();
        tracing::debug!("Detected {} face(s) in probe", face_count);

        if face_count != 1 {
            let mut outcome = AccessOutcome {
                state: AccessState::Unknown(face_count),
                face_count,
                match_score: None,
                artifact_url: None,
                degraded: Vec::new(),
            };
            if self.policy.record_unknown_outcomes {
                self.record_audit(AuditEntry::unknown(AccessStatus::Unknown), &mut outcome.degraded);
                self.record_metric(Metric::Access(AccessStatus::Unknown), &mut outcome.degraded);
            }
            tracing::info!("Access unknown: {} face(s) in probe", face_count);
            return Ok(outcome);
        }

        let candidates = faces.search_face(
            &image,
            &self.policy.collection_id,
            SearchParams {
                max_candidates: self.policy.max_candidates,
                min_similarity: self.policy.similarity_threshold,
            },
        )?;
        let match_score = candidates.first().map(|c| c.similarity);

        for candidate in &candidates {
            let identity = self.collaborators.identities
                .get(&candidate.template_key)
                .map_err(|e| AccessError::Internal(e.to_string()))?;

            match identity {
                Some(identity) => return Ok(self.grant(identity, candidate.similarity)),
                None => tracing::warn!(
                    "Template key {} matched at {:.1} but has no identity record; treating as no match",
                    candidate.template_key, candidate.similarity
                ),
            }
        }

        Ok(self.deny(probe, match_score))
    }

    fn grant(&self, identity: IdentityRecord, similarity: f32) -> AccessOutcome {
        let mut degraded = Vec::new();
        self.record_audit(
            AuditEntry::new(&identity.display_name(), &identity.external_id, AccessStatus::Granted),
            &mut degraded,
        );
        self.record_metric(Metric::Access(AccessStatus::Granted), &mut degraded);

        tracing::info!("Access granted to {} (similarity {:.1})", identity.template_key, similarity);
        AccessOutcome {
            state: AccessState::Granted(identity),
            face_count: 1,
            match_score: Some(similarity),
            artifact_url: None,
            degraded,
        }
    }

    fn deny(&self, probe: &[u8], match_score: Option<f32>) -> AccessOutcome {
        let mut degraded = Vec::new();
        let artifacts = &self.collaborators.artifacts;
        let key = artifact_key(probe);

        let artifact_url = best_effort(SideEffect::ArtifactUpload, &mut degraded, || {
            artifacts.put(&key, probe)?;
            artifacts.presign(&key, self.policy.artifact_url_ttl)
        });

        let alert = Alert::unrecognized_face(artifact_url.clone());
        best_effort(SideEffect::AlertPublish, &mut degraded, || {
            self.collaborators.alerts.publish(&alert)
        });
        self.record_audit(AuditEntry::unknown(AccessStatus::Denied), &mut degraded);
        self.record_metric(Metric::Access(AccessStatus::Denied), &mut degraded);

        tracing::info!("Access denied: no identity matched (artifact {})", key);
        AccessOutcome {
            state: AccessState::Denied,
            face_count: 1,
            match_score,
            artifact_url,
            degraded,
        }
    }

    fn record_audit(&self, entry: AuditEntry, degraded: &mut Vec<SideEffect>) {
        if let Some(audit) = &self.collaborators.audit {
            best_effort(SideEffect::AuditWrite, degraded, || audit.append(&entry));
        }
    }

    fn record_metric(&self, metric: Metric, degraded: &mut Vec<SideEffect>) {
        best_effort(SideEffect::MetricEmit, degraded, || self.collaborators.metrics.emit(metric));
    }
}

/// Timestamp-derived object name for an unmatched probe.
fn artifact_key(probe: &[u8]) -> String {
    let suffix: u16 = rand::thread_rng().gen();
    format!(
        "unknown_{}_{:04x}.{}",
        Utc::now().format("%Y%m%d_%H%M%S_%6f"),
        suffix,
        image_extension(probe)
    )
}

//! Enrollment: validate registration fields, index the face, persist the identity.

use crate::common::Config;
use crate::common::config::QualityFilter;
use crate::core::capability::{CapabilityError, IndexParams};
use crate::core::collaborators::{best_effort, Collaborators, SideEffect};
use crate::core::validation::{decode_image, sanitize_external_id, RegistrationForm};
use crate::sinks::Metric;
use crate::storage::IdentityRecord;
use chrono::Utc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentPolicy {
    pub collection_id: String,
    pub quality_filter: bool,
}

impl EnrollmentPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            collection_id: config.collection.id.clone(),
            quality_filter: config.enrollment.quality_filter == QualityFilter::Auto,
        }
    }
}

impl Default for EnrollmentPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enrollment {
    pub record: IdentityRecord,
    pub degraded: Vec<SideEffect>,
}

impl Enrollment {
    pub fn message(&self) -> &'static str {
        "Employee registered successfully"
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentError {
    #[error("missing required fields")]
    MissingFields,

    #[error("external id has no collection-safe characters")]
    InvalidId,

    #[error("image could not be decoded")]
    InvalidImage,

    #[error("no face detected")]
    NoFaceDetected,

    #[error("face collection not found: {0}")]
    CollectionNotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EnrollmentError {
    pub fn status_code(&self) -> u16 {
        match self {
            EnrollmentError::MissingFields
            | EnrollmentError::InvalidId
            | EnrollmentError::InvalidImage
            | EnrollmentError::NoFaceDetected => 400,
            EnrollmentError::CollectionNotFound(_) | EnrollmentError::Internal(_) => 500,
        }
    }

    pub fn message(&self) -> String {
        match self {
            EnrollmentError::MissingFields => "Missing required fields".to_string(),
            EnrollmentError::InvalidId => "Invalid characters in ID (Cedula)".to_string(),
            EnrollmentError::InvalidImage => "Invalid image format".to_string(),
            EnrollmentError::NoFaceDetected => "No face detected in the image".to_string(),
            EnrollmentError::CollectionNotFound(id) => format!("Face collection {} not found", id),
            EnrollmentError::Internal(_) => "Internal Server Error".to_string(),
        }
    }
}

impl From<CapabilityError> for EnrollmentError {
    fn from(e: CapabilityError) -> Self {
        match e {
            CapabilityError::InvalidImage => EnrollmentError::InvalidImage,
            CapabilityError::CollectionNotFound(id) => EnrollmentError::CollectionNotFound(id),
            CapabilityError::ServiceUnavailable(reason) => EnrollmentError::Internal(reason),
        }
    }
}

pub struct EnrollmentPipeline {
    collaborators: Collaborators,
    policy: EnrollmentPolicy,
}

impl EnrollmentPipeline {
    pub fn new(collaborators: Collaborators, policy: EnrollmentPolicy) -> Self {
        Self { collaborators, policy }
    }

    /// Registers the face and stores an identity record under its template key.
    ///
    /// Does not look for an existing record with the same external id or a
    /// similar face: enrolling the same person twice yields two records.
    pub fn enroll(&self, form: &RegistrationForm) -> Result<Enrollment, EnrollmentError> {
        if !form.is_complete() {
            return Err(EnrollmentError::MissingFields);
        }

        let collection_safe_id = sanitize_external_id(&form.external_id);
        if collection_safe_id.is_empty() {
            return Err(EnrollmentError::InvalidId);
        }

        let image = decode_image(&form.image).ok_or(EnrollmentError::InvalidImage)?;

        let indexed = self.collaborators.faces.index_face(
            &image,
            &self.policy.collection_id,
            &collection_safe_id,
            IndexParams {
                max_faces: 1,
                quality_filter: self.policy.quality_filter,
            },
        )?;
        let template_key = match indexed.into_iter().next() {
            Some(face) => face.template_key,
            None => return Err(EnrollmentError::NoFaceDetected),
        };
        tracing::info!("Face indexed with template key {}", template_key);

        let record = IdentityRecord {
            template_key,
            first_name: form.first_name.clone(),
            last_name: form.last_name.clone(),
            external_id: form.external_id.clone(),
            city: form.city.clone(),
            created_at: Utc::now(),
        };

        if let Err(e) = self.collaborators.identities.put(&record) {
            // The template stays in the collection without a record; verification treats it as no match
            tracing::error!("Failed to store identity for {}: {}", record.template_key, e);
            return Err(EnrollmentError::Internal(e.to_string()));
        }

        let mut degraded = Vec::new();
        best_effort(SideEffect::MetricEmit, &mut degraded, || {
            self.collaborators.metrics.emit(Metric::Registration)
        });

        tracing::info!("Registered {} as {}", record.display_name(), record.template_key);
        Ok(Enrollment { record, degraded })
    }
}

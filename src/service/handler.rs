//! Maps transport requests onto the two pipelines and back into envelopes.

use crate::common::{Config, DevMode, Result};
use crate::core::{
    AccessError, AccessOutcome, AccessPipeline, AccessPolicy, AccessState, Collaborators, EnrollmentError,
    EnrollmentPipeline, EnrollmentPolicy, LocalFaceCapability, RegistrationForm,
};
use crate::service::protocol::{
    AccessResponse, RegistrationRequest, RegistrationResponse, Request, Response, ResponseBody, VerifyRequest,
    STATUS_DENIED, STATUS_ERROR, STATUS_GRANTED,
};
use crate::sinks::{AuditSink, JsonlAuditLog, JsonlMetrics, OutboxAlertChannel};
use crate::storage::{CollectionStore, FileArtifactStore, FileIdentityStore, UrlSigner};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;

/// Both pipelines over one set of collaborators.
pub struct Gate {
    access: AccessPipeline,
    enrollment: EnrollmentPipeline,
}

impl Gate {
    pub fn new(collaborators: Collaborators, access: AccessPolicy, enrollment: EnrollmentPolicy) -> Self {
        Self {
            access: AccessPipeline::new(collaborators.clone(), access),
            enrollment: EnrollmentPipeline::new(collaborators, enrollment),
        }
    }

    pub fn from_config(config: &Config, dev_mode: &DevMode) -> Result<Self> {
        Ok(Self::new(
            collaborators(config, dev_mode)?,
            AccessPolicy::from_config(config),
            EnrollmentPolicy::from_config(config),
        ))
    }

    pub fn handle(&self, request: Request) -> Response {
        match request {
            Request::Verify(req) => self.verify(req),
            Request::Register(req) => self.register(req),
        }
    }

    fn verify(&self, request: VerifyRequest) -> Response {
        let probe = decode_payload(&request.image);
        match self.access.decide(&probe) {
            Ok(outcome) => access_response(&outcome),
            Err(e) => access_error_response(&e),
        }
    }

    fn register(&self, request: RegistrationRequest) -> Response {
        let form = RegistrationForm {
            image: decode_payload(&request.image),
            first_name: request.first_name,
            last_name: request.last_name,
            external_id: request.cedula,
            city: request.city,
        };

        match self.enrollment.enroll(&form) {
            Ok(enrollment) => Response {
                status_code: 200,
                body: ResponseBody::Registration(RegistrationResponse {
                    message: enrollment.message().to_string(),
                    face_id: Some(enrollment.record.template_key),
                    cedula: Some(enrollment.record.external_id),
                }),
            },
            Err(e) => {
                if let EnrollmentError::Internal(reason) = &e {
                    tracing::error!("Registration failed: {}", reason);
                }
                Response::registration(e.status_code(), e.message())
            }
        }
    }
}

/// Wires the on-device capability and the file-backed stores and sinks.
pub fn collaborators(config: &Config, dev_mode: &DevMode) -> Result<Collaborators> {
    let collections = Arc::new(CollectionStore::new(dev_mode.collections_dir())?);
    if collections.load(&config.collection.id)?.is_none() {
        tracing::warn!(
            "Face collection {} does not exist yet; create it before registering",
            config.collection.id
        );
    }

    let logs_dir = dev_mode.logs_dir();
    let audit: Option<Arc<dyn AuditSink>> = match &config.audit.log_name {
        Some(name) => Some(Arc::new(JsonlAuditLog::open(&logs_dir, name)?)),
        None => {
            tracing::info!("No audit log configured; access attempts will not be audited");
            None
        }
    };

    Ok(Collaborators {
        faces: Arc::new(LocalFaceCapability::from_config(config, collections)?),
        identities: Arc::new(FileIdentityStore::new(dev_mode.identities_dir())?),
        artifacts: Arc::new(artifact_store(config, dev_mode)?),
        alerts: Arc::new(OutboxAlertChannel::open(&logs_dir, &config.alerts.channel)?),
        audit,
        metrics: Arc::new(JsonlMetrics::open(&logs_dir, &config.metrics.namespace)?),
    })
}

/// Artifact store shared by the service and `artifact resolve`.
pub fn artifact_store(config: &Config, dev_mode: &DevMode) -> Result<FileArtifactStore> {
    let signer = match &config.artifacts.signing_key {
        Some(key) => UrlSigner::new(key.as_bytes()),
        None => {
            tracing::warn!("No artifact signing key configured; URLs will not survive a restart");
            UrlSigner::random()
        }
    };

    FileArtifactStore::new(
        dev_mode.artifacts_dir(),
        &config.artifacts.bucket,
        &config.artifacts.url_base,
        signer,
    )
}

/// Base64 payload to bytes, ignoring line wrapping. Undecodable text passes
/// through unchanged so that field checks still run first and image decoding
/// rejects it.
fn decode_payload(encoded: &str) -> Vec<u8> {
    let compact: String = encoded.split_ascii_whitespace().collect();
    match STANDARD.decode(compact) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!("Image payload is not valid base64: {}", e);
            encoded.as_bytes().to_vec()
        }
    }
}

fn access_response(outcome: &AccessOutcome) -> Response {
    let status = match outcome.state {
        AccessState::Granted(_) => STATUS_GRANTED,
        AccessState::Denied | AccessState::Unknown(_) => STATUS_DENIED,
    };

    Response {
        status_code: outcome.status_code(),
        body: ResponseBody::Access(AccessResponse {
            status: status.to_string(),
            message: outcome.message(),
            employee_id: outcome.employee_id().map(str::to_string),
        }),
    }
}

fn access_error_response(error: &AccessError) -> Response {
    if let AccessError::Internal(reason) = error {
        tracing::error!("Verification failed: {}", reason);
    }
    Response::access(error.status_code(), STATUS_ERROR, error.message(), None)
}

use crate::common::Result;
use crate::core::capability::FaceCapability;
use crate::sinks::{AlertChannel, AuditSink, MetricsSink};
use crate::storage::{ArtifactStore, IdentityStore};
use std::sync::Arc;

/// Handles the pipelines call out to. Built once at startup and shared.
#[derive(Clone)]
pub struct Collaborators {
    pub faces: Arc<dyn FaceCapability>,
    pub identities: Arc<dyn IdentityStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub alerts: Arc<dyn AlertChannel>,
    /// `None` disables audit logging entirely.
    pub audit: Option<Arc<dyn AuditSink>>,
    pub metrics: Arc<dyn MetricsSink>,
}

/// A side effect that failed without changing the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    ArtifactUpload,
    AlertPublish,
    AuditWrite,
    MetricEmit,
}

/// Runs one side effect; a failure is logged and noted, never propagated.
pub(crate) fn best_effort<T>(
    effect: SideEffect,
    degraded: &mut Vec<SideEffect>,
    op: impl FnOnce() -> Result<T>,
) -> Option<T> {
    match op() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("{:?} failed, continuing: {}", effect, e);
            degraded.push(effect);
            None
        }
    }
}

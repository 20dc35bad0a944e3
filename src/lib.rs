// Core modules
pub mod common;
pub mod core;
pub mod storage;
pub mod sinks;
pub mod service;

// Re-export commonly used types
pub use common::{Config, DevMode, GateError, Result, SIMILARITY_THRESHOLD};
pub use crate::core::{
    AccessError, AccessOutcome, AccessPipeline, AccessPolicy, AccessState, Collaborators, Enrollment,
    EnrollmentError, EnrollmentPipeline, EnrollmentPolicy, FaceCapability, LocalFaceCapability,
    RegistrationForm, SideEffect,
};
pub use storage::{IdentityRecord, IdentityStore};
pub use service::{protocol, Gate, ServiceClient};

// Short paths for the common modules
pub mod config {
    pub use crate::common::config::*;
}
pub mod dev_mode {
    pub use crate::common::dev_mode::*;
}
pub mod error {
    pub use crate::common::error::*;
}
pub mod paths {
    pub use crate::common::paths::*;
}

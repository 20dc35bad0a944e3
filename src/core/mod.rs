pub mod access;
pub mod bulk;
pub mod capability;
pub mod collaborators;
pub mod detector;
pub mod enrollment;
pub mod local;
pub mod quality;
pub mod recognizer;
pub mod validation;

pub use access::{AccessError, AccessOutcome, AccessPipeline, AccessPolicy, AccessState};
pub use bulk::{enroll_directory, FileEnrollment};
pub use capability::{
    BoundingBox, CapabilityError, CapabilityResult, FaceCapability, FaceDetail, FaceMatch, IndexParams,
    IndexedFace, SearchParams,
};
pub use collaborators::{Collaborators, SideEffect};
pub use detector::FaceDetector;
pub use enrollment::{Enrollment, EnrollmentError, EnrollmentPipeline, EnrollmentPolicy};
pub use local::{FaceEngine, LocalFaceCapability, OnnxEngine};
pub use quality::QualityMetrics;
pub use recognizer::{cosine_similarity, Embedding, FaceRecognizer};
pub use validation::{sanitize_external_id, RegistrationForm};

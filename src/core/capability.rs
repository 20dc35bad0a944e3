//! Contract between the pipelines and whatever detects and matches faces.
//!
//! Implementations report failures through the closed [`CapabilityError`]
//! set; callers branch on the variant, never on message text.

use image::DynamicImage;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }
}

/// One face found by `detect_faces`.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceDetail {
    pub bounding_box: BoundingBox,
    pub confidence: f32,
}

/// A search candidate; `similarity` is on the 0-100 scale.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceMatch {
    pub template_key: String,
    pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFace {
    pub template_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    pub max_candidates: usize,
    pub min_similarity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexParams {
    pub max_faces: usize,
    pub quality_filter: bool,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("image could not be decoded")]
    InvalidImage,

    #[error("face collection not found: {0}")]
    CollectionNotFound(String),

    #[error("face service unavailable: {0}")]
    ServiceUnavailable(String),
}

pub type CapabilityResult<T> = std::result::Result<T, CapabilityError>;

pub trait FaceCapability: Send + Sync {
    fn detect_faces(&self, image: &DynamicImage) -> CapabilityResult<Vec<FaceDetail>>;

    /// Candidates above `params.min_similarity`, best first, at most `params.max_candidates`.
    fn search_face(
        &self,
        image: &DynamicImage,
        collection_id: &str,
        params: SearchParams,
    ) -> CapabilityResult<Vec<FaceMatch>>;

    /// Empty when no face was found or the quality filter rejected it.
    fn index_face(
        &self,
        image: &DynamicImage,
        collection_id: &str,
        external_id: &str,
        params: IndexParams,
    ) -> CapabilityResult<Vec<IndexedFace>>;
}

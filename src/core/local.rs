//! On-device face capability: ONNX detection and embeddings matched against
//! bincode collections on disk.

use crate::common::{Config, GateError, Result};
use crate::core::capability::{
    CapabilityError, CapabilityResult, FaceCapability, FaceDetail, FaceMatch, IndexParams, IndexedFace,
    SearchParams,
};
use crate::core::detector::FaceDetector;
use crate::core::quality::QualityMetrics;
use crate::core::recognizer::{cosine_similarity, Embedding, FaceRecognizer};
use crate::storage::collection::{CollectionFace, CollectionStore};
use image::DynamicImage;
use std::sync::{Arc, Mutex};

/// Detection plus embedding, the two model calls the capability needs.
pub trait FaceEngine: Send {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceDetail>>;
    fn embed(&self, image: &DynamicImage, face: &FaceDetail) -> Result<Embedding>;
}

pub struct OnnxEngine {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxEngine {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            detector: FaceDetector::new(config)?,
            recognizer: FaceRecognizer::new(config)?,
        })
    }
}

impl FaceEngine for OnnxEngine {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceDetail>> {
        self.detector.detect(image)
    }

    fn embed(&self, image: &DynamicImage, face: &FaceDetail) -> Result<Embedding> {
        self.recognizer.get_embedding(image, face)
    }
}

pub struct LocalFaceCapability {
    // Sessions are run one at a time
    engine: Mutex<Box<dyn FaceEngine>>,
    collections: Arc<CollectionStore>,
    min_quality: f32,
}

impl LocalFaceCapability {
    pub fn new(engine: Box<dyn FaceEngine>, collections: Arc<CollectionStore>, min_quality: f32) -> Self {
        Self {
            engine: Mutex::new(engine),
            collections,
            min_quality,
        }
    }

    pub fn from_config(config: &Config, collections: Arc<CollectionStore>) -> Result<Self> {
        let engine = OnnxEngine::new(config)?;
        Ok(Self::new(Box::new(engine), collections, config.enrollment.min_quality))
    }

    fn with_engine<T>(&self, f: impl FnOnce(&dyn FaceEngine) -> Result<T>) -> CapabilityResult<T> {
        let engine = self
            .engine
            .lock()
            .map_err(|_| CapabilityError::ServiceUnavailable("face engine lock poisoned".into()))?;
        f(engine.as_ref()).map_err(unavailable)
    }

    /// Embedding of the most confident face, if any.
    fn primary_embedding(&self, image: &DynamicImage) -> CapabilityResult<Option<(FaceDetail, Embedding)>> {
        self.with_engine(|engine| {
            let faces = engine.detect(image)?;
            match primary_face(faces) {
                Some(face) => {
                    let embedding = engine.embed(image, &face)?;
                    Ok(Some((face, embedding)))
                }
                None => Ok(None),
            }
        })
    }
}

impl FaceCapability for LocalFaceCapability {
    fn detect_faces(&self, image: &DynamicImage) -> CapabilityResult<Vec<FaceDetail>> {
        self.with_engine(|engine| engine.detect(image))
    }

    fn search_face(
        &self,
        image: &DynamicImage,
        collection_id: &str,
        params: SearchParams,
    ) -> CapabilityResult<Vec<FaceMatch>> {
        let collection = self
            .collections
            .load(collection_id)
            .map_err(unavailable)?
            .ok_or_else(|| CapabilityError::CollectionNotFound(collection_id.to_string()))?;

        let probe = match self.primary_embedding(image)? {
            Some((_, embedding)) => embedding,
            None => return Ok(Vec::new()),
        };

        Ok(rank_candidates(&probe, &collection.faces, params))
    }

    fn index_face(
        &self,
        image: &DynamicImage,
        collection_id: &str,
        external_id: &str,
        params: IndexParams,
    ) -> CapabilityResult<Vec<IndexedFace>> {
        if self.collections.load(collection_id).map_err(unavailable)?.is_none() {
            return Err(CapabilityError::CollectionNotFound(collection_id.to_string()));
        }
        if params.max_faces == 0 {
            return Ok(Vec::new());
        }

        let (face, embedding) = match self.primary_embedding(image)? {
            Some(found) => found,
            None => {
                tracing::debug!("No face to index for {}", external_id);
                return Ok(Vec::new());
            }
        };

        if params.quality_filter {
            let quality = QualityMetrics::calculate(image, &face);
            if !quality.meets_minimum_requirements(self.min_quality) {
                tracing::info!(
                    "Face for {} rejected by quality filter ({:.2} < {:.2})",
                    external_id, quality.overall_score, self.min_quality
                );
                return Ok(Vec::new());
            }
        }

        let template_key = self
            .collections
            .add_face(collection_id, external_id, embedding)
            .map_err(unavailable)?
            .ok_or_else(|| CapabilityError::CollectionNotFound(collection_id.to_string()))?;

        Ok(vec![IndexedFace { template_key }])
    }
}

fn unavailable(e: GateError) -> CapabilityError {
    CapabilityError::ServiceUnavailable(e.to_string())
}

fn primary_face(faces: Vec<FaceDetail>) -> Option<FaceDetail> {
    faces.into_iter().max_by(|a, b| a.confidence.total_cmp(&b.confidence))
}

/// Scores every stored template against the probe on a 0-100 scale and keeps
/// the best `max_candidates` at or above `min_similarity`.
pub fn rank_candidates(probe: &[f32], faces: &[CollectionFace], params: SearchParams) -> Vec<FaceMatch> {
    let mut matches: Vec<FaceMatch> = faces
        .iter()
        .map(|face| FaceMatch {
            template_key: face.template_key.clone(),
            similarity: (cosine_similarity(probe, &face.embedding) * 100.0).clamp(0.0, 100.0),
        })
        .filter(|m| m.similarity >= params.min_similarity)
        .collect();

    matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    matches.truncate(params.max_candidates);
    matches
}

use crate::common::{Config, GateError, Result};
use crate::core::capability::FaceDetail;
use crate::core::detector::load_session;
use ort::{Environment, Session, Value};
use std::sync::Arc;
use image::{DynamicImage, imageops::FilterType};
use ndarray::{Array4, CowArray};

pub type Embedding = Vec<f32>;

/// ArcFace-style embedding model.
pub struct FaceRecognizer {
    session: Session,
    _environment: Arc<Environment>,
    input_size: u32,
    normalization_value: f32,
}

impl FaceRecognizer {
    pub fn new(config: &Config) -> Result<Self> {
        let (session, environment) = load_session("face_recognizer", &config.models.recognizer_path, config)?;

        Ok(Self {
            session,
            _environment: environment,
            input_size: config.recognizer.input_size,
            normalization_value: config.recognizer.normalization_value,
        })
    }

    pub fn get_embedding(&self, image: &DynamicImage, face: &FaceDetail) -> Result<Embedding> {
        let face_img = crop_face(image, face);
        let resized = face_img.resize_exact(self.input_size, self.input_size, FilterType::Triangle);

        let input_array = self.preprocess_face(&resized);
        let cow_array = CowArray::from(input_array.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;
        let outputs = self.session.run(vec![input_tensor])?;

        let first = outputs
            .first()
            .ok_or_else(|| GateError::Model("Recognizer produced no outputs".into()))?;
        let embedding: Embedding = first.try_extract::<f32>()?.view().iter().copied().collect();
        if embedding.is_empty() {
            return Err(GateError::Model("Recognizer produced an empty embedding".into()));
        }
        Ok(embedding)
    }

    fn preprocess_face(&self, img: &DynamicImage) -> Array4<f32> {
        let rgb = img.to_rgb8();
        let size = self.input_size as usize;
        let mut array = Array4::<f32>::zeros((1, 3, size, size));
        let norm = self.normalization_value;

        for (x, y, pixel) in rgb.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for channel in 0..3 {
                array[[0, channel, y, x]] = (pixel[channel] as f32 - norm) / norm;
            }
        }

        array
    }
}

fn crop_face(image: &DynamicImage, face: &FaceDetail) -> DynamicImage {
    let b = &face.bounding_box;
    let x = b.x1.max(0.0) as u32;
    let y = b.y1.max(0.0) as u32;
    let width = (b.x2 - b.x1).max(1.0) as u32;
    let height = (b.y2 - b.y1).max(1.0) as u32;

    image.crop_imm(x, y, width, height)
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

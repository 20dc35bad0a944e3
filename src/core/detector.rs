use crate::common::{Config, GateError, Result};
use crate::core::capability::{BoundingBox, FaceDetail};
use ort::{Environment, GraphOptimizationLevel, Session, SessionBuilder, Value};
use std::path::Path;
use std::sync::Arc;
use image::{DynamicImage, imageops::FilterType};
use ndarray::{Array4, CowArray};

const NMS_IOU_THRESHOLD: f32 = 0.45;
const MIN_BOX_SIZE: f32 = 10.0;
const MAX_FACES: usize = 10;

/// Opens an ONNX session with the configured graph optimization level.
pub(crate) fn load_session(name: &str, model_path: &Path, config: &Config) -> Result<(Session, Arc<Environment>)> {
    let environment = Arc::new(
        Environment::builder()
            .with_name(name)
            .build()
            .map_err(|e| GateError::Model(format!("Failed to create environment: {}", e)))?
    );

    if !model_path.exists() {
        return Err(GateError::Model(
            format!("{} model not found at: {:?}", name, model_path)
        ));
    }

    let opt_level = match config.performance.optimization_level {
        0 => GraphOptimizationLevel::Disable,
        1 => GraphOptimizationLevel::Level1,
        2 => GraphOptimizationLevel::Level2,
        _ => GraphOptimizationLevel::Level3,
    };
    let session = SessionBuilder::new(&environment)?
        .with_optimization_level(opt_level)?
        .with_model_from_file(model_path)?;

    Ok((session, environment))
}

/// YOLO-style single-class face detector.
pub struct FaceDetector {
    session: Session,
    _environment: Arc<Environment>,
    input_width: u32,
    input_height: u32,
    confidence_threshold: f32,
}

impl FaceDetector {
    pub fn new(config: &Config) -> Result<Self> {
        let (session, environment) = load_session("face_detector", &config.models.detector_path, config)?;

        Ok(Self {
            session,
            _environment: environment,
            input_width: config.detector.input_width,
            input_height: config.detector.input_height,
            confidence_threshold: config.detector.detection_confidence,
        })
    }

    /// Faces above the confidence threshold, most confident first, in original image coordinates.
    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceDetail>> {
        let orig_width = image.width() as f32;
        let orig_height = image.height() as f32;

        let img_array = if image.width() == self.input_width && image.height() == self.input_height {
            image_to_array(image)
        } else {
            let resized = image.resize_exact(self.input_width, self.input_height, FilterType::Triangle);
            image_to_array(&resized)
        };

        let cow_array = CowArray::from(img_array.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;
        let outputs = self.session.run(vec![input_tensor])?;

        let first = outputs
            .first()
            .ok_or_else(|| GateError::Model("Detector produced no outputs".into()))?;
        let output = first.try_extract::<f32>()?.view().to_owned();
        let shape = output.shape().to_vec();
        let values: Vec<f32> = output.iter().copied().collect();

        let mut faces = parse_predictions(&values, &shape, self.input_width as f32, self.input_height as f32);

        // Duplicates go before the confidence cut so overlapping weak boxes cannot survive
        faces = apply_nms(faces, NMS_IOU_THRESHOLD);
        faces.retain(|face| face.confidence >= self.confidence_threshold);
        faces.truncate(MAX_FACES);

        let scale_x = orig_width / self.input_width as f32;
        let scale_y = orig_height / self.input_height as f32;
        for face in &mut faces {
            face.bounding_box.x1 *= scale_x;
            face.bounding_box.x2 *= scale_x;
            face.bounding_box.y1 *= scale_y;
            face.bounding_box.y2 *= scale_y;
        }

        Ok(faces)
    }
}

fn image_to_array(img: &DynamicImage) -> Array4<f32> {
    let rgb = img.to_rgb8();
    let width = rgb.width() as usize;
    let height = rgb.height() as usize;
    let mut array = Array4::<f32>::zeros((1, 3, height, width));

    let norm_factor = 1.0 / 255.0;
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        array[[0, 0, y, x]] = pixel[0] as f32 * norm_factor;
        array[[0, 1, y, x]] = pixel[1] as f32 * norm_factor;
        array[[0, 2, y, x]] = pixel[2] as f32 * norm_factor;
    }

    array
}

/// Decodes `[1, N, 5]` or transposed `[1, 5, N]` output rows of
/// `(x_center, y_center, width, height, confidence)`.
fn parse_predictions(values: &[f32], shape: &[usize], input_width: f32, input_height: f32) -> Vec<FaceDetail> {
    let (num_predictions, prediction_length, is_transposed) = match shape.len() {
        3 if shape[2] > shape[1] && shape[1] <= 10 => (shape[2], shape[1], true),
        3 => (shape[1], shape[2], false),
        2 => (shape[0], shape[1], false),
        _ => {
            tracing::warn!("Unexpected detector output shape: {:?}", shape);
            return Vec::new();
        }
    };

    if prediction_length < 5 || values.len() < num_predictions * prediction_length {
        tracing::warn!("Detector output too short for shape {:?}", shape);
        return Vec::new();
    }

    let at = |i: usize, field: usize| {
        if is_transposed {
            values[field * num_predictions + i]
        } else {
            values[i * prediction_length + field]
        }
    };

    let mut faces = Vec::new();
    for i in 0..num_predictions {
        let (cx, cy, w, h, confidence) = (at(i, 0), at(i, 1), at(i, 2), at(i, 3), at(i, 4));
        if confidence <= 0.001 {
            continue;
        }

        // Normalized coordinates need scaling to the model input
        let (sx, sy) = if cx > 1.0 || cy > 1.0 || w > 1.0 || h > 1.0 {
            (1.0, 1.0)
        } else {
            (input_width, input_height)
        };
        let (cx, cy, w, h) = (cx * sx, cy * sy, w * sx, h * sy);

        let x1 = (cx - w / 2.0).max(0.0);
        let y1 = (cy - h / 2.0).max(0.0);
        let x2 = (cx + w / 2.0).min(input_width);
        let y2 = (cy + h / 2.0).min(input_height);

        if x2 - x1 > MIN_BOX_SIZE && y2 - y1 > MIN_BOX_SIZE {
            faces.push(FaceDetail {
                bounding_box: BoundingBox { x1, y1, x2, y2 },
                confidence,
            });
        }
    }

    faces
}

fn apply_nms(mut boxes: Vec<FaceDetail>, iou_threshold: f32) -> Vec<FaceDetail> {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<FaceDetail> = Vec::new();
    for candidate in boxes {
        if keep.iter().all(|kept| iou(&kept.bounding_box, &candidate.bounding_box) < iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let overlap = BoundingBox {
        x1: a.x1.max(b.x1),
        y1: a.y1.max(b.y1),
        x2: a.x2.min(b.x2),
        y2: a.y2.min(b.y2),
    };
    let intersection = overlap.area();
    let union = a.area() + b.area() - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

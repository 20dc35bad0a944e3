use crate::core::capability::FaceDetail;
use image::DynamicImage;

#[derive(Debug, Clone)]
pub struct QualityMetrics {
    pub detection_confidence: f32,
    pub face_size_ratio: f32,
    pub face_centering_score: f32,
    pub brightness_score: f32,
    pub contrast_score: f32,
    pub overall_score: f32,
}

impl QualityMetrics {
    /// Scores how usable a detected face is as an enrollment template.
    pub fn calculate(image: &DynamicImage, face: &FaceDetail) -> Self {
        let detection_confidence = face.confidence;
        let b = &face.bounding_box;

        let img_width = image.width() as f32;
        let img_height = image.height() as f32;
        let face_size_ratio = (b.area() / (img_width * img_height)).min(1.0);

        let face_center_x = (b.x1 + b.x2) / 2.0;
        let face_center_y = (b.y1 + b.y2) / 2.0;
        let img_center_x = img_width / 2.0;
        let img_center_y = img_height / 2.0;

        let x_offset = ((face_center_x - img_center_x).abs() / img_center_x).min(1.0);
        let y_offset = ((face_center_y - img_center_y).abs() / img_center_y).min(1.0);
        let face_centering_score = 1.0 - (x_offset + y_offset) / 2.0;

        let (brightness_score, contrast_score) = region_brightness_contrast(image, face);

        let overall_score = detection_confidence * 0.3
            + face_size_ratio * 0.2
            + face_centering_score * 0.2
            + brightness_score * 0.15
            + contrast_score * 0.15;

        QualityMetrics {
            detection_confidence,
            face_size_ratio,
            face_centering_score,
            brightness_score,
            contrast_score,
            overall_score,
        }
    }

    pub fn meets_minimum_requirements(&self, min_quality: f32) -> bool {
        self.overall_score >= min_quality
    }
}

fn region_brightness_contrast(image: &DynamicImage, face: &FaceDetail) -> (f32, f32) {
    let gray = image.to_luma8();
    let b = &face.bounding_box;

    let x1 = b.x1.max(0.0) as u32;
    let y1 = b.y1.max(0.0) as u32;
    let x2 = b.x2.min(gray.width() as f32) as u32;
    let y2 = b.y2.min(gray.height() as f32) as u32;

    if x2 <= x1 || y2 <= y1 {
        return (0.5, 0.5);
    }

    let mut sum = 0u64;
    let mut sum_sq = 0u64;
    let mut count = 0u64;
    for y in y1..y2 {
        for x in x1..x2 {
            let pixel = gray.get_pixel(x, y)[0] as u64;
            sum += pixel;
            sum_sq += pixel * pixel;
            count += 1;
        }
    }

    let mean = sum as f32 / count as f32;
    let variance = (sum_sq as f32 / count as f32 - mean * mean).max(0.0);

    // Ideal mean sits mid-range; a std dev of 64 counts as full contrast
    let brightness_score = 1.0 - ((mean - 127.5).abs() / 127.5).min(1.0);
    let contrast_score = (variance.sqrt() / 64.0).min(1.0);

    (brightness_score, contrast_score)
}

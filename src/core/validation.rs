//! Input checks shared by both pipelines.

use image::DynamicImage;

/// Registration fields as they arrive from the transport boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationForm {
    pub image: Vec<u8>,
    pub first_name: String,
    pub last_name: String,
    pub external_id: String,
    pub city: String,
}

impl RegistrationForm {
    /// True when the image and every text field are present and non-empty.
    pub fn is_complete(&self) -> bool {
        !self.image.is_empty()
            && [&self.first_name, &self.last_name, &self.external_id, &self.city]
                .iter()
                .all(|field| !field.is_empty())
    }
}

/// Strips every character outside `[A-Za-z0-9_.:-]`.
pub fn sanitize_external_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-'))
        .collect()
}

/// Decodes probe bytes; `None` when no supported image format matches.
pub fn decode_image(bytes: &[u8]) -> Option<DynamicImage> {
    if bytes.is_empty() {
        return None;
    }
    image::load_from_memory(bytes).ok()
}

/// File extension for a stored probe image, from its magic bytes.
pub fn image_extension(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Png) => "png",
        Ok(image::ImageFormat::Jpeg) => "jpg",
        Ok(image::ImageFormat::Gif) => "gif",
        Ok(image::ImageFormat::WebP) => "webp",
        Ok(image::ImageFormat::Bmp) => "bmp",
        _ => "bin",
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GateError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Template key already registered: {0}")]
    DuplicateTemplateKey(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("ORT error: {0}")]
    Ort(#[from] ort::OrtError),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for GateError {
    fn from(e: serde_json::Error) -> Self {
        GateError::Serialization(e.to_string())
    }
}

impl From<bincode::Error> for GateError {
    fn from(e: bincode::Error) -> Self {
        GateError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GateError>;

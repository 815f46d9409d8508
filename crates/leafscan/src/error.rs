use thiserror::Error;

#[derive(Error, Debug)]
pub enum LeafScanError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Missing optional dependency: {0}")]
    MissingDependency(&'static str),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LeafScanError>;

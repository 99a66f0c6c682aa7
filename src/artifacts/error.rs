// Artifact store errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Invalid artifact id: {0}")]
    InvalidId(String),

    #[error("Invalid artifact path: {0}")]
    InvalidPath(String),

    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(String),

    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Failed to write artifact: {0}")]
    WriteFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ArtifactError>;

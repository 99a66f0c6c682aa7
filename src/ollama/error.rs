// Error types for Ollama module

use thiserror::Error;

/// Runtime errors from the Ollama client
#[derive(Debug, Error)]
pub enum OllamaError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Exhausted: max retries ({retries}) exceeded, last error: {last_error}")]
    Exhausted { retries: u32, last_error: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OllamaError {
    /// Whether opening the stream again could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, OllamaError::Server(_) | OllamaError::Network(_))
    }
}

/// Initialization errors for the Ollama client
#[derive(Debug, Error)]
pub enum OllamaInitError {
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Failed to create HTTP client: {0}")]
    ClientError(#[from] reqwest::Error),
}

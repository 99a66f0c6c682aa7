// Hub errors

use crate::artifacts::ArtifactError;
use crate::executor::ExecutorError;
use crate::ollama::OllamaError;
use crate::relay::RelayError;
use thiserror::Error;

/// Errors while serving one request; each becomes a `requestError` event
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Ollama(#[from] OllamaError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

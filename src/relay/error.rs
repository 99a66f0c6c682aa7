// Relay errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Client channel closed")]
    ChannelClosed,

    #[error("Failed to encode event '{0}': {1}")]
    Encode(String, String),
}

use thiserror::Error;

/// Comm module initialization errors
#[derive(Debug, Error)]
pub enum CommInitError {
    #[error("Invalid listen address: {0}")]
    InvalidAddress(String),

    #[error("Failed to bind TCP listener: {0}")]
    BindFailed(String),
}

/// Comm module runtime errors
#[derive(Debug, Error)]
pub enum CommError {
    #[error("Failed to accept connection: {0}")]
    AcceptError(String),

    #[error("Failed to receive frame: {0}")]
    RecvError(String),

    #[error("Failed to send frame: {0}")]
    SendError(String),

    #[error("Failed to decode packet: {0}")]
    DecodeError(String),

    #[error("Failed to encode packet: {0}")]
    EncodeError(String),

    #[error("Frame too large: {0} bytes")]
    FrameTooLarge(usize),

    #[error("Channel closed")]
    ChannelClosed,
}

/// Result type for comm operations
pub type Result<T> = std::result::Result<T, CommError>;

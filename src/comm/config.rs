use crate::comm::error::CommInitError;
use crate::env::{parse_env_var, string_env_var};
use std::net::SocketAddr;

/// Comm module configuration
#[derive(Debug, Clone)]
pub struct CommConfig {
    /// Listen address (default: 127.0.0.1)
    pub listen_addr: String,
    /// Listen port (default: 3001)
    pub listen_port: u16,
    /// Largest accepted frame, header included (default: 1 MiB)
    pub max_frame_bytes: usize,
    /// Requests buffered towards the hub (default: 1024)
    pub request_queue: usize,
    /// Outbound frames buffered per connection (default: 256)
    pub outbound_queue: usize,
}

impl Default for CommConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1".to_string(),
            listen_port: 3001,
            max_frame_bytes: 1024 * 1024,
            request_queue: 1024,
            outbound_queue: 256,
        }
    }
}

impl CommConfig {
    /// Load from `CHATHUB_LISTEN_ADDR`, `CHATHUB_PORT` and `CHATHUB_MAX_FRAME_BYTES`
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        Self {
            listen_addr: string_env_var("CHATHUB_LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            listen_port: parse_env_var("CHATHUB_PORT", defaults.listen_port),
            max_frame_bytes: parse_env_var("CHATHUB_MAX_FRAME_BYTES", defaults.max_frame_bytes),
            ..defaults
        }
    }

    /// Returns the socket address to bind to
    pub fn bind_addr(&self) -> Result<SocketAddr, CommInitError> {
        let addr = format!("{}:{}", self.listen_addr, self.listen_port);
        addr.parse()
            .map_err(|_| CommInitError::InvalidAddress(addr))
    }
}

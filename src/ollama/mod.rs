// Ollama module - upstream model server client

pub mod client;
pub mod error;
pub mod types;

pub use client::{ByteStream, OllamaClient};
pub use error::{OllamaError, OllamaInitError};
pub use types::{ChatMessage, ChatOptions, ChatRequest, ModelInfo, ModelList};

use crate::env::{parse_env_var, string_env_var};

/// Ollama client configuration
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Model server base URL
    pub host: String,
    /// Model used when a chat request names none
    pub default_model: String,
    /// Maximum attempts to open a stream after the first one
    pub max_retries: u32,
    /// Base retry delay in milliseconds
    pub base_retry_delay_ms: u64,
    /// TCP connect timeout in seconds; streams themselves have no deadline
    pub connect_timeout_secs: u64,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".to_string(),
            default_model: "llama3".to_string(),
            max_retries: 3,
            base_retry_delay_ms: 500,
            connect_timeout_secs: 10,
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
        }
    }
}

impl OllamaConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = OllamaConfig::default();
        if let Some(host) = string_env_var("OLLAMA_HOST") {
            config.host = host;
        }
        if let Some(model) = string_env_var("OLLAMA_MODEL") {
            config.default_model = model;
        }
        config.max_retries = parse_env_var("OLLAMA_MAX_RETRIES", config.max_retries);
        config.base_retry_delay_ms =
            parse_env_var("OLLAMA_RETRY_DELAY_MS", config.base_retry_delay_ms);
        config.connect_timeout_secs =
            parse_env_var("OLLAMA_CONNECT_TIMEOUT_SECS", config.connect_timeout_secs);
        config
    }
}

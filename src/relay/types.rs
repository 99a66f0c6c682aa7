// Data types for the relay

use serde::{Deserialize, Serialize};

/// Role of streamed content; the model only ever speaks as assistant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkRole {
    Assistant,
}

/// The part of one upstream fragment the relay acts on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamChunk {
    pub role: ChunkRole,
    pub content_delta: String,
    pub is_final: bool,
}

impl StreamChunk {
    /// Read `message.content` and `done` from an upstream fragment
    pub fn from_fragment(fragment: &serde_json::Value) -> Self {
        let content_delta = fragment
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .to_string();
        let is_final = fragment
            .get("done")
            .and_then(|d| d.as_bool())
            .unwrap_or(false);

        Self {
            role: ChunkRole::Assistant,
            content_delta,
            is_final,
        }
    }
}

/// Relay tuning
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Longest accepted upstream record
    pub max_line_bytes: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_line_bytes: 1024 * 1024,
        }
    }
}

/// What a finished relay saw
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelaySummary {
    /// Concatenated content deltas
    pub content: String,
    /// Fragments forwarded to the client
    pub fragments: usize,
    /// Malformed or oversized records skipped
    pub skipped: usize,
    /// Artifact saves started
    pub artifacts: usize,
}

/// How a relay ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Completed(RelaySummary),
    Failed(String),
    Disconnected,
}

// Data types for the artifacts module

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// What an artifact holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Code,
    Text,
    Document,
    Image,
    File,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Code => "code",
            ArtifactKind::Text => "text",
            ArtifactKind::Document => "document",
            ArtifactKind::Image => "image",
            ArtifactKind::File => "file",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload handed to the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArtifactContent {
    /// Literal text, or a base64 `data:` URL
    Text(String),
    Bytes(Vec<u8>),
}

impl From<String> for ArtifactContent {
    fn from(s: String) -> Self {
        ArtifactContent::Text(s)
    }
}

impl From<&str> for ArtifactContent {
    fn from(s: &str) -> Self {
        ArtifactContent::Text(s.to_string())
    }
}

impl From<Vec<u8>> for ArtifactContent {
    fn from(bytes: Vec<u8>) -> Self {
        ArtifactContent::Bytes(bytes)
    }
}

/// A persisted artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: String,
    pub name: String,
    pub kind: ArtifactKind,
    pub mime_type: String,
    /// Only present on the record returned by `save`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ArtifactContent>,
    pub size_bytes: u64,
    pub storage_path: PathBuf,
    pub public_url: String,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    /// Same record without the inline payload
    pub fn without_content(&self) -> Self {
        Self {
            content: None,
            ..self.clone()
        }
    }
}

/// Metadata captured at write time, stored next to the data file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMeta {
    pub id: String,
    pub name: String,
    pub kind: ArtifactKind,
    pub mime_type: String,
    pub file_name: String,
    pub created_at: DateTime<Utc>,
}

/// Which detector produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Detector {
    /// Language-tagged fenced block
    Fenced,
    /// Keyword match over the whole text
    Heuristic,
}

/// An artifact found in model output, not yet persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateArtifact {
    pub kind: ArtifactKind,
    pub name: String,
    pub language: String,
    pub extension: String,
    pub mime_type: String,
    pub content: String,
    pub detector: Detector,
}

// Artifacts module - detection and persistence of generated artifacts

pub mod config;
pub mod error;
pub mod extractor;
pub mod mime;
pub mod store;
pub mod types;

pub use config::ArtifactConfig;
pub use error::{ArtifactError, Result};
pub use extractor::{extract, extract_at};
pub use store::ArtifactStore;
pub use types::{Artifact, ArtifactContent, ArtifactKind, CandidateArtifact, Detector};

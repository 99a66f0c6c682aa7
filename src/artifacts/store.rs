// Artifact persistence
//
// Layout under the root: `{id}.{ext}` holds the bytes, `{id}.meta.json`
// holds what was known at write time. Both names derive from the id alone.

use crate::artifacts::config::ArtifactConfig;
use crate::artifacts::error::{ArtifactError, Result};
use crate::artifacts::mime::{
    kind_for_extension, mime_for_extension, mime_for_kind, storage_extension,
};
use crate::artifacts::types::{Artifact, ArtifactContent, ArtifactKind, ArtifactMeta};
use base64::Engine;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

const SIDECAR_SUFFIX: &str = ".meta.json";

/// File-backed artifact store keyed by generated ids
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    config: ArtifactConfig,
}

impl ArtifactStore {
    pub fn new(config: ArtifactConfig) -> Self {
        Self { config }
    }

    /// Create the store and make sure its root exists
    pub async fn init(config: ArtifactConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.root).await?;
        info!(root = %config.root.display(), "artifact store initialized");
        Ok(Self::new(config))
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Persist `content` under a fresh id.
    ///
    /// Text starting with `data:` is decoded as a data URL; any other text
    /// and raw bytes are written as-is.
    pub async fn save(
        &self,
        content: impl Into<ArtifactContent>,
        name: &str,
        kind: ArtifactKind,
        mime_type: Option<&str>,
    ) -> Result<Artifact> {
        let content = content.into();
        let (bytes, data_url_mime) = decode_content(&content)?;

        let mime_type = mime_type
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .or(data_url_mime)
            .unwrap_or_else(|| mime_for_kind(kind).to_string());

        let id = Uuid::new_v4().to_string();
        let extension = storage_extension(kind, Some(mime_type.as_str()));
        let file_name = format!("{}.{}", id, extension);
        let storage_path = self.config.root.join(&file_name);

        let meta = ArtifactMeta {
            id: id.clone(),
            name: if name.is_empty() {
                file_name.clone()
            } else {
                name.to_string()
            },
            kind,
            mime_type,
            file_name: file_name.clone(),
            created_at: Utc::now(),
        };
        let sidecar = serde_json::to_vec_pretty(&meta)?;

        tokio::fs::create_dir_all(&self.config.root).await?;
        write_pair(&storage_path, &bytes, &self.sidecar_path(&id), &sidecar).await?;
        let size_bytes = bytes.len() as u64;

        info!(
            id = %id,
            name = %meta.name,
            kind = %kind,
            size_bytes = size_bytes,
            "artifact saved"
        );

        Ok(Artifact {
            id,
            name: meta.name,
            kind,
            mime_type: meta.mime_type,
            content: Some(content),
            size_bytes,
            storage_path,
            public_url: self.config.public_url(&file_name),
            created_at: meta.created_at,
        })
    }

    /// Look up one artifact by id
    pub async fn get(&self, id: &str) -> Result<Option<Artifact>> {
        validate_id(id)?;

        if let Some(meta) = self.read_sidecar(id).await {
            let path = self.config.root.join(&meta.file_name);
            return match tokio::fs::metadata(&path).await {
                Ok(stat) => Ok(Some(self.record_from_meta(meta, path, stat.len()))),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(id = %id, "sidecar without data file");
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            };
        }

        // Files written by something other than `save`
        Ok(self
            .scan()
            .await?
            .into_iter()
            .find(|artifact| artifact.id == id))
    }

    /// Every artifact under the root, oldest first
    pub async fn list(&self) -> Result<Vec<Artifact>> {
        let mut artifacts = self.scan().await?;
        artifacts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(artifacts)
    }

    /// Remove an artifact; unknown ids are a no-op
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let Some(artifact) = self.get(id).await? else {
            debug!(id = %id, "delete of unknown artifact ignored");
            return Ok(false);
        };

        remove_quietly(&artifact.storage_path).await;
        remove_quietly(&self.sidecar_path(id)).await;

        info!(id = %id, "artifact deleted");
        Ok(true)
    }

    /// Stored bytes of an artifact
    pub async fn read(&self, id: &str) -> Result<Vec<u8>> {
        let artifact = self
            .get(id)
            .await?
            .ok_or_else(|| ArtifactError::NotFound(id.to_string()))?;
        Ok(tokio::fs::read(&artifact.storage_path).await?)
    }

    /// Static file lookup by stored file name, as served under the URL prefix
    pub async fn serve(&self, file_name: &str) -> Result<Vec<u8>> {
        if file_name.is_empty()
            || file_name.contains('/')
            || file_name.contains('\\')
            || file_name.contains("..")
            || file_name.ends_with(SIDECAR_SUFFIX)
        {
            return Err(ArtifactError::InvalidPath(file_name.to_string()));
        }

        match tokio::fs::read(self.config.root.join(file_name)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ArtifactError::NotFound(file_name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve a public URL produced by `save` back to its bytes
    pub async fn resolve_url(&self, url: &str) -> Result<Vec<u8>> {
        let prefix = format!("{}/", self.config.url_prefix.trim_end_matches('/'));
        let file_name = url
            .strip_prefix(&prefix)
            .ok_or_else(|| ArtifactError::InvalidPath(url.to_string()))?;
        self.serve(file_name).await
    }

    fn sidecar_path(&self, id: &str) -> PathBuf {
        self.config.root.join(format!("{}{}", id, SIDECAR_SUFFIX))
    }

    async fn read_sidecar(&self, id: &str) -> Option<ArtifactMeta> {
        let raw = tokio::fs::read(self.sidecar_path(id)).await.ok()?;
        match serde_json::from_slice(&raw) {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!(id = %id, error = %e, "unreadable artifact sidecar, inferring from extension");
                None
            }
        }
    }

    fn record_from_meta(&self, meta: ArtifactMeta, path: PathBuf, size_bytes: u64) -> Artifact {
        Artifact {
            public_url: self.config.public_url(&meta.file_name),
            id: meta.id,
            name: meta.name,
            kind: meta.kind,
            mime_type: meta.mime_type,
            content: None,
            size_bytes,
            storage_path: path,
            created_at: meta.created_at,
        }
    }

    /// Rebuild records for every data file under the root
    async fn scan(&self) -> Result<Vec<Artifact>> {
        let mut entries = match tokio::fs::read_dir(&self.config.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut artifacts = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let stat = entry.metadata().await?;
            if !stat.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if file_name.ends_with(SIDECAR_SUFFIX) {
                continue;
            }
            let path = entry.path();
            let id = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| file_name.clone());

            if let Some(meta) = self.read_sidecar(&id).await {
                if meta.file_name == file_name {
                    artifacts.push(self.record_from_meta(meta, path, stat.len()));
                    continue;
                }
            }

            // Best effort: the extension is all we know
            let extension = path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default();
            let created_at: DateTime<Utc> = stat
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            artifacts.push(Artifact {
                id,
                name: file_name.clone(),
                kind: kind_for_extension(&extension),
                mime_type: mime_for_extension(&extension).to_string(),
                content: None,
                size_bytes: stat.len(),
                storage_path: path,
                public_url: self.config.public_url(&file_name),
                created_at,
            });
        }

        Ok(artifacts)
    }
}

/// Data file first, then its sidecar; without a sidecar the data file is removed
async fn write_pair(data_path: &Path, bytes: &[u8], sidecar_path: &Path, sidecar: &[u8]) -> Result<()> {
    tokio::fs::write(data_path, bytes)
        .await
        .map_err(|e| ArtifactError::WriteFailed(e.to_string()))?;

    if let Err(e) = tokio::fs::write(sidecar_path, sidecar).await {
        warn!(path = %sidecar_path.display(), error = %e, "sidecar write failed, discarding data file");
        remove_quietly(data_path).await;
        return Err(ArtifactError::WriteFailed(e.to_string()));
    }
    Ok(())
}

/// Bytes to write plus the media type announced by a data URL
fn decode_content(content: &ArtifactContent) -> Result<(Vec<u8>, Option<String>)> {
    match content {
        ArtifactContent::Text(text) if text.starts_with("data:") => decode_data_url(text),
        ArtifactContent::Text(text) => Ok((text.as_bytes().to_vec(), None)),
        ArtifactContent::Bytes(bytes) => Ok((bytes.clone(), None)),
    }
}

fn decode_data_url(url: &str) -> Result<(Vec<u8>, Option<String>)> {
    let rest = &url["data:".len()..];
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| ArtifactError::InvalidDataUrl("missing ',' separator".to_string()))?;

    let (media_type, is_base64) = match header.strip_suffix(";base64") {
        Some(media_type) => (media_type, true),
        None => (header, false),
    };
    let media_type = media_type
        .split(';')
        .next()
        .filter(|m| !m.is_empty())
        .map(str::to_string);

    let bytes = if is_base64 {
        base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| ArtifactError::InvalidDataUrl(e.to_string()))?
    } else {
        data.as_bytes().to_vec()
    };

    Ok((bytes, media_type))
}

/// Ids become file names, so they must not escape the root
fn validate_id(id: &str) -> Result<()> {
    if id.is_empty()
        || id.contains('/')
        || id.contains('\\')
        || id.contains("..")
        || id.contains('\0')
    {
        return Err(ArtifactError::InvalidId(id.to_string()));
    }
    Ok(())
}

/// Deletion failures are logged, never returned
async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove artifact file"),
    }
}

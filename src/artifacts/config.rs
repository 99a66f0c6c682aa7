// Artifact store configuration

use crate::env::string_env_var;
use std::path::PathBuf;

/// Artifact store configuration
#[derive(Debug, Clone)]
pub struct ArtifactConfig {
    /// Directory holding artifact files and their sidecars
    pub root: PathBuf,
    /// Path prefix under which the root is served
    pub url_prefix: String,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("artifacts"),
            url_prefix: "/artifacts".to_string(),
        }
    }
}

impl ArtifactConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = ArtifactConfig::default();
        if let Some(root) = string_env_var("ARTIFACTS_DIR") {
            config.root = PathBuf::from(root);
        }
        if let Some(prefix) = string_env_var("ARTIFACTS_URL_PREFIX") {
            config.url_prefix = prefix;
        }
        config
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Public URL for a stored file name
    pub fn public_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.url_prefix.trim_end_matches('/'), file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url_joins_prefix() {
        let mut config = ArtifactConfig::default();
        assert_eq!(config.public_url("a.txt"), "/artifacts/a.txt");
        config.url_prefix = "/static/".to_string();
        assert_eq!(config.public_url("a.txt"), "/static/a.txt");
    }
}

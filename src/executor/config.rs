// Executor configuration

use crate::env::{flag_env_var, parse_env_var, string_env_var};
use crate::executor::types::ExecutionConstraints;
use std::path::PathBuf;

/// Executor configuration
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Code execution runs arbitrary programs and stays off unless explicitly enabled
    pub enabled: bool,
    /// Default execution constraints
    pub constraints: ExecutionConstraints,
    /// Path to tools.toml configuration file
    pub tools_toml_path: PathBuf,
    /// PATH handed to the child; the only inherited variable
    pub search_path: Option<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            constraints: ExecutionConstraints::default(),
            tools_toml_path: PathBuf::from("tools.toml"),
            search_path: std::env::var("PATH").ok(),
        }
    }
}

impl ExecutorConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = ExecutorConfig {
            enabled: flag_env_var("ENABLE_CODE_EXECUTOR"),
            ..Default::default()
        };

        config.constraints.timeout_secs =
            parse_env_var("SANDBOX_TIMEOUT_SECS", config.constraints.timeout_secs);
        config.constraints.max_output_bytes =
            parse_env_var("SANDBOX_MAX_OUTPUT_BYTES", config.constraints.max_output_bytes);
        if let Some(dir) = string_env_var("SANDBOX_DIR") {
            config.constraints.working_dir = PathBuf::from(dir);
        }
        if let Some(path) = string_env_var("TOOLS_TOML") {
            config.tools_toml_path = PathBuf::from(path);
        }

        config
    }

    /// Enabled config rooted at the given working directory
    pub fn enabled_in(working_dir: impl Into<PathBuf>) -> Self {
        let mut config = ExecutorConfig {
            enabled: true,
            ..Default::default()
        };
        config.constraints.working_dir = working_dir.into();
        config
    }
}

// Data types for Executor module

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Interpreters the sandbox is allowed to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    Bash,
}

impl Language {
    /// Every supported language, in the order they are advertised
    pub const ALL: [Language; 3] = [Language::Python, Language::JavaScript, Language::Bash];

    /// Interpreter binary, resolved through the sandbox PATH
    pub fn interpreter(&self) -> &'static str {
        match self {
            Language::Python => "python3",
            Language::JavaScript => "node",
            Language::Bash => "bash",
        }
    }

    /// Extension of the materialized script file
    pub fn extension(&self) -> &'static str {
        match self {
            Language::Python => "py",
            Language::JavaScript => "js",
            Language::Bash => "sh",
        }
    }

    /// Comma-separated list of every supported language
    pub fn supported() -> String {
        Language::ALL
            .iter()
            .map(Language::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::Bash => "bash",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "python" | "py" => Ok(Language::Python),
            "javascript" | "js" | "node" => Ok(Language::JavaScript),
            "bash" | "sh" | "shell" => Ok(Language::Bash),
            other => Err(other.to_string()),
        }
    }
}

/// A single execution request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub language: Language,
    pub source_code: String,
}

/// Why an execution did not succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Disabled,
    UnsupportedLanguage,
    SpawnError,
    Timeout,
    OutputLimitExceeded,
    NonzeroExit,
}

/// Outcome of one sandboxed execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    pub output: String,
    pub error: String,
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub failure: Option<FailureKind>,
    #[serde(default)]
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// Failure that happened before or instead of a process run
    pub fn failed(kind: FailureKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: error.into(),
            exit_code: None,
            failure: Some(kind),
            duration_ms: 0,
        }
    }
}

/// Output from a tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Tool result content (JSON text for structured tools)
    pub content: String,
    /// Whether the tool reported a failure
    #[serde(default)]
    pub is_error: bool,
}

impl ToolOutput {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Constraints applied to every execution
#[derive(Debug, Clone)]
pub struct ExecutionConstraints {
    /// Wall-clock limit in seconds
    pub timeout_secs: u64,
    /// Byte cap applied to each captured stream
    pub max_output_bytes: usize,
    /// Private directory holding script files; also cwd and HOME of the child
    pub working_dir: PathBuf,
    /// How long to wait for pipe readers after the child is gone
    pub drain_grace_ms: u64,
}

impl Default for ExecutionConstraints {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            max_output_bytes: 50_000,
            working_dir: std::env::temp_dir().join("chathub-sandbox"),
            drain_grace_ms: 1000,
        }
    }
}

// Code execution tool backed by the sandbox

use crate::executor::sandbox::SandboxExecutor;
use crate::executor::tool::{ToolDefinition, ToolImpl};
use crate::executor::types::{ExecutionConstraints, Language};
use crate::executor::{ExecutorError, Result, ToolOutput};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

pub const CODE_TOOL_NAME: &str = "execute_code";

/// Code tool input parameters
#[derive(Debug, Deserialize)]
struct CodeInput {
    language: String,
    code: String,
}

/// Exposes the sandbox as a named tool
pub struct CodeTool {
    sandbox: Arc<SandboxExecutor>,
    description: String,
}

impl CodeTool {
    pub fn new(sandbox: Arc<SandboxExecutor>, description: impl Into<String>) -> Self {
        Self {
            sandbox,
            description: description.into(),
        }
    }
}

#[async_trait]
impl ToolImpl for CodeTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: CODE_TOOL_NAME.to_string(),
            description: self.description.clone(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "language": {
                        "type": "string",
                        "enum": Language::ALL.iter().map(Language::as_str).collect::<Vec<_>>(),
                        "description": "Interpreter to run the code with"
                    },
                    "code": {
                        "type": "string",
                        "description": "Source code to execute"
                    }
                },
                "required": ["language", "code"]
            }),
        }
    }

    async fn run(&self, input: serde_json::Value) -> Result<ToolOutput> {
        let CodeInput { language, code } = serde_json::from_value(input)
            .map_err(|e| ExecutorError::InvalidInput(CODE_TOOL_NAME.to_string(), e.to_string()))?;

        debug!(language = %language, code_bytes = code.len(), "running code tool");

        let result = self.sandbox.execute(&language, &code).await;
        let content = serde_json::to_string(&result)?;

        Ok(if result.success {
            ToolOutput::success(content)
        } else {
            ToolOutput::error(content)
        })
    }
}

/// Default code tool description, stating the limits actually in force
pub fn default_code_description(constraints: &ExecutionConstraints) -> String {
    format!(
        "Execute a short program in an isolated sandbox.\n\
Supported languages: {}.\n\
Runs with a {} second timeout and a {} byte output cap; stdin is closed.\n\
Returns JSON with success, output, error and exitCode.",
        Language::supported(),
        constraints.timeout_secs,
        constraints.max_output_bytes
    )
}

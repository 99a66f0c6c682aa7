// Tool registry

use crate::executor::code::{CodeTool, default_code_description, CODE_TOOL_NAME};
use crate::executor::config::ExecutorConfig;
use crate::executor::error::{ExecutorError, Result};
use crate::executor::sandbox::SandboxExecutor;
use crate::executor::tool::{ToolDefinition, ToolImpl};
use crate::executor::types::ToolOutput;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Named tools available to clients
pub struct Executor {
    sandbox: Arc<SandboxExecutor>,
    tools: RwLock<HashMap<String, Arc<dyn ToolImpl>>>,
}

impl Executor {
    /// Initialize the sandbox and register the built-in tools
    pub fn init(config: ExecutorConfig) -> Self {
        debug!(
            tools_toml = %config.tools_toml_path.display(),
            "initializing executor"
        );

        // Load tool descriptions from config file
        let descriptions = crate::executor::tool::load_tool_descriptions(&config.tools_toml_path)
            .unwrap_or_default();

        let code_desc = descriptions
            .get(CODE_TOOL_NAME)
            .cloned()
            .unwrap_or_else(|| default_code_description(&config.constraints));

        let sandbox = Arc::new(SandboxExecutor::new(config));

        let mut tools = HashMap::new();
        let code_tool = Arc::new(CodeTool::new(sandbox.clone(), code_desc)) as Arc<dyn ToolImpl>;
        tools.insert(CODE_TOOL_NAME.to_string(), code_tool);

        info!(
            tool_count = tools.len(),
            sandbox_enabled = sandbox.is_enabled(),
            "executor initialized with tools"
        );

        Self {
            sandbox,
            tools: RwLock::new(tools),
        }
    }

    /// The sandbox behind the code tool
    pub fn sandbox(&self) -> Arc<SandboxExecutor> {
        self.sandbox.clone()
    }

    /// Register an additional tool, replacing any tool of the same name
    pub fn register(&self, tool: Arc<dyn ToolImpl>) {
        let mut tools = self.tools.write().unwrap_or_else(|e| e.into_inner());
        tools.insert(tool.name(), tool);
    }

    /// Get all tool definitions, sorted by name
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let tools = self.tools.read().unwrap_or_else(|e| e.into_inner());
        let mut defs: Vec<ToolDefinition> = tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Execute a tool by name with JSON input
    pub async fn execute(&self, tool_name: &str, input: serde_json::Value) -> Result<ToolOutput> {
        debug!(tool_name = %tool_name, "looking up tool");

        let tool = {
            let tools = self.tools.read().unwrap_or_else(|e| e.into_inner());
            tools.get(tool_name).cloned()
        };

        let tool = tool.ok_or_else(|| ExecutorError::UnknownTool(tool_name.to_string()))?;

        info!(tool_name = %tool_name, "executing tool");
        tool.run(input).await
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::init(ExecutorConfig::default())
    }
}

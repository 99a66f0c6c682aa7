// Tool trait and tool description loading
#![allow(clippy::collapsible_if)]

use crate::executor::{Result, ToolOutput};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Tool definition advertised to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "input_schema")]
    pub input_schema: serde_json::Value,
}

/// Internal trait for tool implementations
#[async_trait]
pub trait ToolImpl: Send + Sync {
    /// Get the tool definition (name, description, input_schema)
    fn definition(&self) -> ToolDefinition;

    /// Run the tool with JSON input
    async fn run(&self, input: serde_json::Value) -> Result<ToolOutput>;

    /// Get tool name
    fn name(&self) -> String {
        self.definition().name.clone()
    }
}

/// Load tool descriptions from TOML config file
pub fn load_tool_descriptions(
    path: &std::path::Path,
) -> Result<std::collections::HashMap<String, String>> {
    use std::collections::HashMap;

    if !path.exists() {
        debug!(path = %path.display(), "tools.toml not found, using default descriptions");
        return Ok(HashMap::new());
    }

    let content = std::fs::read_to_string(path)?;
    let config: toml::Table = toml::from_str(&content)?;

    let mut descriptions = HashMap::new();

    for (key, value) in config {
        if let Some(desc) = value.get("description") {
            if let Some(s) = desc.as_str() {
                descriptions.insert(key, s.to_string());
            }
        }
    }

    debug!(path = %path.display(), tool_count = descriptions.len(), "loaded tool descriptions from config");
    Ok(descriptions)
}

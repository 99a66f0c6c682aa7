// Event names for non-streaming replies

/// Sandbox outcome for `Execute`
pub const EXECUTION_RESULT: &str = "executionResult";
/// Tool output for `CallTool`
pub const TOOL_RESULT: &str = "toolResult";
pub const TOOLS: &str = "tools";
pub const MODELS: &str = "models";
pub const ARTIFACTS: &str = "artifacts";
pub const ARTIFACT: &str = "artifact";
pub const ARTIFACT_DELETED: &str = "artifactDeleted";

// Executor module - sandboxed code execution and the tool registry

pub mod code;
pub mod config;
pub mod error;
pub mod runner;
pub mod sandbox;
pub mod tool;
pub mod types;

pub use config::ExecutorConfig;
pub use error::{ExecutorError, Result};
pub use runner::Executor;
pub use sandbox::SandboxExecutor;
pub use tool::{ToolDefinition, ToolImpl};
pub use types::{
    ExecutionConstraints, ExecutionRequest, ExecutionResult, FailureKind, Language, ToolOutput,
};

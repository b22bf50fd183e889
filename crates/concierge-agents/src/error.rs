//! Error Types for the concierge agents

use std::path::PathBuf;

use agent_core::AgentError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ToolError>;

/// Failures inside leaf tools and their collaborators
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Missing credential: set the environment variable {0}")]
    MissingCredential(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error for {path}: {reason}")]
    Storage { path: PathBuf, reason: String },

    #[error("Path {0} is outside the searchable root")]
    OutsideRoot(PathBuf),

    #[error("{service} returned an error: {message}")]
    Upstream { service: String, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Mcp(#[from] McpError),
}

impl ToolError {
    pub fn storage(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::Storage {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn upstream(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            service: service.into(),
            message: message.into(),
        }
    }
}

impl From<ToolError> for AgentError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::InvalidInput(msg) => Self::ToolValidation(msg),
            other => Self::ToolExecution(other.to_string()),
        }
    }
}

/// MCP server process and protocol failures
#[derive(Error, Debug)]
pub enum McpError {
    #[error("failed to start MCP server '{server}': {reason}")]
    Spawn { server: String, reason: String },

    #[error("MCP transport error ({server}): {reason}")]
    Transport { server: String, reason: String },

    #[error("MCP server '{server}' did not answer {method} within {seconds}s")]
    Timeout {
        server: String,
        method: String,
        seconds: u64,
    },

    #[error("MCP server error {code}: {message}")]
    Server { code: i32, message: String },

    #[error("unexpected MCP response to {method}: {reason}")]
    Protocol { method: String, reason: String },
}

impl From<McpError> for AgentError {
    fn from(err: McpError) -> Self {
        Self::ToolExecution(err.to_string())
    }
}

/// Problems with the YAML configuration; always fatal at startup
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file {path} could not be read: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("config file {path} is malformed: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("{section}: {reason}")]
    Invalid { section: String, reason: String },
}

impl ConfigError {
    pub fn invalid(section: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            section: section.into(),
            reason: reason.into(),
        }
    }
}

impl From<ConfigError> for AgentError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_are_fatal() {
        let err: AgentError = ConfigError::invalid("movies_agent.model", "unknown prefix").into();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("movies_agent.model"));
    }

    #[test]
    fn invalid_tool_input_maps_to_validation() {
        let err: AgentError = ToolError::InvalidInput("rating must be 0-10".into()).into();
        assert!(matches!(err, AgentError::ToolValidation(_)));

        let err: AgentError = ToolError::MissingCredential("OMDB_API_KEY".into()).into();
        assert!(matches!(err, AgentError::ToolExecution(ref m) if m.contains("OMDB_API_KEY")));
    }
}

//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
///
/// Only `Config` is fatal. Tool and delegate failures are converted into
/// structured tool results at the tool boundary, speech failures fall back to
/// text-only output, and interrupts return control to the prompt.
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Tool not found in registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool validation failed
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Tool execution failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// A delegated query into another agent failed
    #[error("Delegate '{agent}' failed: {reason}")]
    Delegate { agent: String, reason: String },

    /// Delegation chain exceeded the configured ceiling
    #[error("Routing too deep: depth {depth} exceeds maximum of {max}")]
    RoutingTooDeep { depth: usize, max: usize },

    /// Maximum model calls reached within one turn
    #[error("Maximum iterations ({0}) reached")]
    MaxIterations(usize),

    /// Parse error (e.g., tool call arguments)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration error (unknown model prefix, missing credentials, bad config file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Speech engine could not be initialised
    #[error("Speech engine unavailable: {0}")]
    SpeechInit(String),

    /// Speech synthesis or playback failed
    #[error("Speech error: {0}")]
    Speech(String),

    /// The user interrupted the current turn
    #[error("Interrupted by user")]
    Interrupted,

    /// Rate limited
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Whether the process should stop rather than report and continue
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Provider(msg) => format!("The AI service encountered an error: {msg}"),
            Self::ProviderUnavailable(_) => {
                "The AI service is currently unavailable. Please try again.".into()
            }
            Self::ToolNotFound(name) => format!("The tool '{name}' is not available."),
            Self::ToolValidation(msg) => format!("Invalid tool input: {msg}"),
            Self::ToolExecution(msg) => format!("Tool error: {msg}"),
            Self::Delegate { agent, .. } => format!("The {agent} assistant could not finish."),
            Self::RoutingTooDeep { .. } => {
                "The request bounced between too many assistants. Please rephrase it.".into()
            }
            Self::MaxIterations(_) => {
                "The request took too long to process. Please try a simpler query.".into()
            }
            Self::Config(msg) => format!("Configuration problem: {msg}"),
            Self::SpeechInit(_) | Self::Speech(_) => {
                "Audio is unavailable, continuing with text only.".into()
            }
            Self::Interrupted => "Interrupted.".into(),
            Self::RateLimited(_) => "You've made too many requests. Please wait a moment.".into(),
            Self::Auth(_) => "Authentication failed. Please check your credentials.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_configuration_errors_are_fatal() {
        assert!(AgentError::Config("bad prefix".into()).is_fatal());
        assert!(!AgentError::ToolExecution("boom".into()).is_fatal());
        assert!(!AgentError::SpeechInit("no device".into()).is_fatal());
        assert!(!AgentError::Interrupted.is_fatal());
    }

    #[test]
    fn routing_too_deep_message() {
        let err = AgentError::RoutingTooDeep { depth: 5, max: 4 };
        assert!(err.to_string().contains("Routing too deep"));
        assert!(err.user_message().contains("too many assistants"));
    }
}

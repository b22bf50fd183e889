//! LLM Provider Strategy Pattern
//!
//! Defines a common interface for all chat-completion backends (OpenRouter,
//! Anthropic, Ollama, ...) so agents work with any backend without code
//! changes. Which backend serves a given model id is decided by a
//! [`ProviderResolver`]; the concrete registry lives in `agent-runtime`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let provider = resolver.resolve(&spec.model)?;
//! let mut stream = provider.complete_stream(&request).await?;
//! while let Some(chunk) = stream.next().await { /* ... */ }
//! ```

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Result;
use crate::message::{Message, ToolCallRequest};
use crate::tool::ToolSchema;

/// Per-agent model settings, as read from configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier including its routing prefix
    /// (e.g., "openrouter/mistralai/devstral-small", "anthropic/claude-sonnet-4", "ollama/llama3.2")
    pub model_id: String,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Stream partial output as it is generated
    #[serde(default = "default_streaming", rename = "streaming")]
    pub streaming_enabled: bool,

    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Name of the environment variable holding the API key.
    /// Backends fall back to their conventional variable when unset.
    #[serde(default, rename = "api_key_env", skip_serializing_if = "Option::is_none")]
    pub credentials_ref: Option<String>,

    /// Endpoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

const fn default_max_tokens() -> u32 {
    10_000
}
const fn default_streaming() -> bool {
    true
}
const fn default_temperature() -> f32 {
    0.7
}

impl ModelConfig {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            max_tokens: default_max_tokens(),
            streaming_enabled: default_streaming(),
            temperature: default_temperature(),
            credentials_ref: None,
            base_url: None,
        }
    }
}

/// Options sent with each completion request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model name as the backend expects it (routing prefix removed)
    pub model: String,

    /// Temperature for sampling
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Stop sequences
    #[serde(default)]
    pub stop_sequences: Vec<String>,
}

impl GenerationOptions {
    /// Sampling settings of `config`, addressed to the backend's own model name
    pub fn from_model(config: &ModelConfig, wire_model: impl Into<String>) -> Self {
        Self {
            model: wire_model.into(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            stop_sequences: Vec::new(),
        }
    }
}

/// Everything a backend needs for one model call
#[derive(Clone, Debug)]
pub struct CompletionRequest {
    /// System prompt, kept apart from the message window
    pub system_prompt: String,

    /// Conversation window, oldest first
    pub messages: Vec<Message>,

    /// Tools the model may call
    pub tools: Vec<ToolSchema>,

    pub options: GenerationOptions,
}

/// Response from a non-streaming completion
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text
    pub content: String,

    /// Tool calls requested by the model, in the order it emitted them
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,

    /// Model that generated this response
    pub model: String,

    /// Token usage statistics (if available)
    pub usage: Option<TokenUsage>,

    /// Finish reason
    pub finish_reason: Option<FinishReason>,
}

/// Token usage statistics
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Reason for completion finishing
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolUse,
    ContentFilter,
    Error,
}

/// A chunk from a streaming completion
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    /// Assistant text delta
    Text { delta: String },

    /// Fragment of a tool call. `index` correlates fragments of the same
    /// call; `id` and `name` usually arrive only on the first fragment.
    ToolCallDelta {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments: String,
    },

    /// End of the response
    Done {
        usage: Option<TokenUsage>,
        finish_reason: Option<FinishReason>,
    },
}

/// Stream type for completion streaming
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

impl Completion {
    /// Replay a finished completion as the chunks a streaming backend would have sent
    pub fn into_chunks(self) -> Vec<StreamChunk> {
        let mut chunks = Vec::with_capacity(self.tool_calls.len() + 2);
        if !self.content.is_empty() {
            chunks.push(StreamChunk::Text {
                delta: self.content,
            });
        }
        for (index, call) in self.tool_calls.into_iter().enumerate() {
            chunks.push(StreamChunk::ToolCallDelta {
                index,
                id: Some(call.id),
                name: Some(call.name),
                arguments: call.arguments,
            });
        }
        chunks.push(StreamChunk::Done {
            usage: self.usage,
            finish_reason: self.finish_reason,
        });
        chunks
    }
}

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new LLM backends.
/// The agent works exclusively through this interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Model name sent on the wire (routing prefix already removed)
    fn model(&self) -> &str;

    /// Check if the provider is reachable and configured correctly
    async fn health_check(&self) -> Result<bool>;

    /// Generate a completion for the request
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;

    /// Generate a streaming completion.
    ///
    /// Backends without incremental output inherit this replay of `complete`.
    async fn complete_stream(&self, request: &CompletionRequest) -> Result<CompletionStream> {
        let completion = self.complete(request).await?;
        let chunks: Vec<Result<StreamChunk>> =
            completion.into_chunks().into_iter().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

/// Maps a model configuration to the backend that serves it.
///
/// Resolution must fail with `AgentError::Config` for unknown model ids
/// before any network activity.
pub trait ProviderResolver: Send + Sync {
    fn resolve(&self, model: &ModelConfig) -> Result<Arc<dyn LlmProvider>>;
}

//! Conversation Messages
//!
//! Standard message format used across the agent system, plus the bounded
//! sliding window each agent keeps as model context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Role of a message sender
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt/instructions
    System,
    /// User input
    User,
    /// Assistant (LLM) response
    Assistant,
    /// Tool result (injected as context)
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

/// A tool invocation exactly as the model requested it.
///
/// `arguments` is the encoded JSON text the model produced; it is parsed
/// only when the call is executed so malformed payloads can be reported
/// back to the model instead of failing the turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// A single message in a conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,

    /// Text content
    pub content: String,

    /// Tool calls requested by an assistant message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,

    /// Call this message answers (tool messages only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a tool result message
    pub fn tool(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        let mut msg = Self::new(Role::Tool, content);
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    /// Attach the tool calls an assistant message requested
    pub fn with_tool_calls(mut self, calls: Vec<ToolCallRequest>) -> Self {
        self.tool_calls = calls;
        self
    }
}

/// Default number of messages an agent keeps as context
pub const DEFAULT_WINDOW_SIZE: usize = 10;

/// Bounded sliding window of conversation messages.
///
/// Once more than `window_size` messages are retained the oldest are evicted
/// first. The system prompt lives in the agent spec, not in the window, so it
/// is never evicted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
    messages: VecDeque<Message>,
    window_size: usize,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

impl Conversation {
    /// Create an empty window; a size of zero is treated as one.
    pub fn new(window_size: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            window_size: window_size.max(1),
        }
    }

    /// Add a message to the tail and evict from the head if over capacity
    pub fn push(&mut self, message: Message) {
        self.messages.push_back(message);
        self.enforce_window();
    }

    fn enforce_window(&mut self) {
        while self.messages.len() > self.window_size {
            if let Some(evicted) = self.messages.pop_front() {
                tracing::trace!(role = %evicted.role, "evicted message from window");
            }
        }
        // A tool result whose requesting assistant message was evicted is
        // meaningless to the model (and rejected by most chat APIs). The
        // newest message always stays.
        while self.messages.len() > 1
            && self
                .messages
                .front()
                .is_some_and(|m| m.role == Role::Tool)
        {
            self.messages.pop_front();
        }
    }

    /// Append several messages in order
    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        for message in messages {
            self.push(message);
        }
    }

    /// Retained messages, oldest first
    pub fn messages(&self) -> Vec<Message> {
        self.messages.iter().cloned().collect()
    }

    /// The window as it would look with `pending` appended, leaving `self`
    /// untouched
    pub fn with_pending(&self, pending: &[Message]) -> Vec<Message> {
        let mut view = self.clone();
        view.extend(pending.iter().cloned());
        view.messages()
    }

    /// Iterate retained messages, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// Get the last message
    pub fn last(&self) -> Option<&Message> {
        self.messages.back()
    }

    /// Drop all retained messages
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Configured capacity
    pub const fn window_size(&self) -> usize {
        self.window_size
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

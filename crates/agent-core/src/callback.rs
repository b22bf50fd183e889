//! Callback Events
//!
//! Every agent in the tree reports what it is doing through one shared
//! [`CallbackHandler`]. Events carry the originating agent and its delegation
//! depth so renderers can tell nested output apart without inspecting text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One observable step of a turn
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallbackEvent {
    /// Identity of the agent that produced the event
    pub agent: String,

    /// Delegation depth of that agent (root = 0)
    pub depth: usize,

    pub kind: EventKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A fragment of assistant text
    PartialAssistantText { text: String },

    /// A tool call fragment arrived. `raw_input` is the argument text
    /// accumulated so far and may not be valid JSON yet.
    ToolInvocationStarted {
        id: String,
        name: String,
        raw_input: String,
    },

    /// A tool call finished
    ToolInvocationResult {
        id: String,
        name: String,
        success: bool,
        output: String,
    },

    /// One assistant message is complete; buffered text can be flushed
    AssistantMessageComplete { text: String },
}

impl CallbackEvent {
    pub fn new(agent: impl Into<String>, depth: usize, kind: EventKind) -> Self {
        Self {
            agent: agent.into(),
            depth,
            kind,
        }
    }

    pub const fn is_root(&self) -> bool {
        self.depth == 0
    }
}

/// Receiver of callback events.
///
/// Handlers are awaited inline: the agent loop does not produce the next
/// event until `on_event` returns, so a handler may block (for example on
/// audio playback) without events being reordered.
#[async_trait]
pub trait CallbackHandler: Send + Sync {
    async fn on_event(&self, event: CallbackEvent);
}

/// Discards every event
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHandler;

#[async_trait]
impl CallbackHandler for NoopHandler {
    async fn on_event(&self, _event: CallbackEvent) {}
}

//! # agent-core
//!
//! A tree of model-backed agents that call each other as tools.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                            Agent                                │
//! │  ┌─────────────┐  ┌──────────────┐  ┌────────────────────────┐  │
//! │  │  Routing    │  │    Tools     │  │   LlmProvider          │  │
//! │  │    Loop     │──│   Registry   │──│   (via Resolver)       │  │
//! │  └──────┬──────┘  └──────┬───────┘  └────────────────────────┘  │
//! │         │                │ DelegateTool ──► fresh Agent (d+1)   │
//! │         ▼                                                       │
//! │   CallbackHandler (events tagged with agent + depth)            │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Backends are chosen by a [`ProviderResolver`]; concrete adapters live in
//! `agent-runtime`.

pub mod callback;
pub mod delegate;
pub mod error;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod spec;
pub mod tool;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use callback::{CallbackEvent, CallbackHandler, EventKind, NoopHandler};
pub use delegate::DelegateTool;
pub use error::{AgentError, Result};
pub use message::{Conversation, Message, Role, ToolCallRequest};
pub use provider::{LlmProvider, ModelConfig, ProviderResolver};
pub use reasoning::{Agent, AgentEnv, RoutingLimits};
pub use spec::{AgentSpec, AgentSpecBuilder};
pub use tool::{Tool, ToolCall, ToolContext, ToolRegistry, ToolResult};

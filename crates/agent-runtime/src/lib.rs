//! # agent-runtime
//!
//! Concrete backends for `agent-core`, chosen by model-id prefix, plus the
//! speech service used for spoken output.
//!
//! ## Backends
//!
//! | prefix        | adapter                                  |
//! |---------------|------------------------------------------|
//! | `openrouter/` | OpenAI-compatible chat completions (SSE) |
//! | `anthropic/`  | Anthropic Messages API (SSE)             |
//! | `ollama/`     | local Ollama, text tool-call protocol    |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::BackendRegistry;
//!
//! let registry = Arc::new(BackendRegistry::with_defaults());
//! let env = Arc::new(AgentEnv::new(registry, callbacks));
//! let mut agent = Agent::new(spec, env)?;
//! ```

pub mod anthropic;
pub mod openai;
pub mod registry;
pub mod speech;
pub mod sse;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "ollama")]
pub use ollama::OllamaProvider;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiCompatibleProvider;
pub use registry::{BackendKind, BackendRegistry};
pub use speech::{
    CommandEngineSettings, CommandSpeechEngine, SpeechEngine, SpeechService, SpeechStatus,
    VoiceProfile,
};

//! Application State

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use agent_runtime::{BackendRegistry, SpeechService};
use concierge_agents::mcp::McpClient;
use concierge_agents::{AgentTree, ConciergeConfig};

/// Settings the user can flip while the shell is running
#[derive(Clone, Debug)]
pub struct UserPreferences {
    audio: Arc<AtomicBool>,
}

impl UserPreferences {
    pub fn new(audio_enabled: bool) -> Self {
        Self {
            audio: Arc::new(AtomicBool::new(audio_enabled)),
        }
    }

    pub fn audio_enabled(&self) -> bool {
        self.audio.load(Ordering::Relaxed)
    }

    pub fn set_audio(&self, enabled: bool) {
        self.audio.store(enabled, Ordering::Relaxed);
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConciergeConfig>,

    /// Backends by model-id prefix
    pub registry: Arc<BackendRegistry>,

    /// Agent specs, root first
    pub tree: Arc<AgentTree>,

    /// Built once at startup, shared with the renderer
    pub speech: Arc<SpeechService>,

    pub preferences: UserPreferences,

    /// GitHub MCP server, when it could be started
    pub github: Option<Arc<McpClient>>,
}

impl AppState {
    /// Release the speech engine and stop the MCP server
    pub async fn shutdown(&self) {
        self.speech.shutdown().await;
        if let Some(github) = &self.github {
            github.shutdown().await;
        }
    }
}

//! Agent Specifications
//!
//! An [`AgentSpec`] is everything needed to build an agent instance: identity,
//! prompt, tools and model settings. Specs are immutable once built and shared
//! through `Arc`, so any number of fresh agents can be created from one.

use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::message::DEFAULT_WINDOW_SIZE;
use crate::provider::ModelConfig;
use crate::tool::{Tool, ToolRegistry};

#[derive(Clone, Debug)]
pub struct AgentSpec {
    /// Short identity used in logs and callback events (e.g. "movies")
    pub id: String,

    /// Name shown to the user
    pub display_name: String,

    /// What this agent is for; used when describing it to its caller
    pub description: String,

    pub system_prompt: String,

    pub tools: Arc<ToolRegistry>,

    pub model: ModelConfig,

    /// Sliding-window capacity for this agent's conversation
    pub window_size: usize,
}

impl AgentSpec {
    pub fn builder(id: impl Into<String>, model: ModelConfig) -> AgentSpecBuilder {
        AgentSpecBuilder::new(id, model)
    }
}

/// Builder for [`AgentSpec`]; tool registration errors surface at `build`.
pub struct AgentSpecBuilder {
    id: String,
    display_name: Option<String>,
    description: String,
    system_prompt: String,
    tools: Vec<Arc<dyn Tool>>,
    model: ModelConfig,
    window_size: usize,
    acting: bool,
}

impl AgentSpecBuilder {
    pub fn new(id: impl Into<String>, model: ModelConfig) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            description: String::new(),
            system_prompt: String::new(),
            tools: Vec::new(),
            model,
            window_size: DEFAULT_WINDOW_SIZE,
            acting: true,
        }
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn shared_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub const fn window_size(mut self, size: usize) -> Self {
        self.window_size = size;
        self
    }

    /// Agents that only talk may have no tools
    pub const fn conversational(mut self) -> Self {
        self.acting = false;
        self
    }

    pub fn build(self) -> Result<AgentSpec> {
        if self.acting && self.tools.is_empty() {
            return Err(AgentError::Config(format!(
                "agent '{}' has no tools",
                self.id
            )));
        }

        let mut registry = ToolRegistry::new();
        for tool in self.tools {
            registry.register_shared(tool).map_err(|e| {
                AgentError::Config(format!("agent '{}': {e}", self.id))
            })?;
        }

        Ok(AgentSpec {
            display_name: self.display_name.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            description: self.description,
            system_prompt: self.system_prompt,
            tools: Arc::new(registry),
            model: self.model,
            window_size: self.window_size,
        })
    }
}

//! Delegate Tools
//!
//! A delegate tool lets one agent hand a sub-request to another. Each
//! invocation builds a brand-new agent from the target spec, so the callee
//! starts with an empty conversation and sees only the query string.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::reasoning::Agent;
use crate::spec::AgentSpec;
use crate::tool::{ParameterSchema, Tool, ToolCall, ToolContext, ToolResult, ToolSchema};

pub struct DelegateTool {
    name: String,
    description: String,
    target: Arc<AgentSpec>,
}

impl DelegateTool {
    /// Delegate named `<target id>_agent_query`, described by the target's description
    pub fn new(target: Arc<AgentSpec>) -> Self {
        Self {
            name: format!("{}_agent_query", target.id),
            description: target.description.clone(),
            target,
        }
    }
}

#[async_trait]
impl Tool for DelegateTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: vec![ParameterSchema::required(
                "query",
                "string",
                format!(
                    "The request to pass to the {} assistant, in plain language",
                    self.target.display_name
                ),
            )],
            input_schema: None,
            category: Some("delegate".into()),
            has_side_effects: true,
        }
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<ToolResult> {
        let query = call.required_str("query")?;

        let depth = ctx.depth + 1;
        let max = ctx.env.limits.max_depth;
        if depth > max {
            tracing::warn!(caller = %ctx.caller, target = %self.target.id, depth, max, "delegation refused");
            return Err(AgentError::RoutingTooDeep { depth, max });
        }

        tracing::debug!(caller = %ctx.caller, target = %self.target.id, depth, "delegating");

        let mut agent = Agent::new(Arc::clone(&self.target), Arc::clone(&ctx.env))?;
        match agent.query_at_depth(query, depth).await {
            Ok(response) => Ok(ToolResult::success(&self.name, response)),
            Err(e @ AgentError::RoutingTooDeep { .. }) => Err(e),
            Err(e) => Err(AgentError::Delegate {
                agent: self.target.id.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

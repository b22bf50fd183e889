//! MCP tools exposed as agent tools

use std::sync::Arc;

use agent_core::{
    Result as CoreResult, Tool, ToolCall, ToolContext, ToolResult,
    tool::{ParameterSchema, ToolSchema},
};
use async_trait::async_trait;
use serde_json::{Map, Value};

use super::client::McpClient;
use super::types::McpToolDefinition;

/// One tool advertised by an MCP server
pub struct McpTool {
    client: Arc<McpClient>,
    definition: McpToolDefinition,
}

impl McpTool {
    pub const fn new(client: Arc<McpClient>, definition: McpToolDefinition) -> Self {
        Self { client, definition }
    }

    /// Every tool the client's server advertised
    pub fn all(client: &Arc<McpClient>) -> Vec<Arc<dyn Tool>> {
        client
            .tools()
            .iter()
            .map(|def| Arc::new(Self::new(Arc::clone(client), def.clone())) as Arc<dyn Tool>)
            .collect()
    }
}

/// Flat parameter list derived from a JSON Schema object
fn parameters_from_schema(schema: &Value) -> Vec<ParameterSchema> {
    let required: Vec<&str> = schema["required"]
        .as_array()
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let Some(properties) = schema["properties"].as_object() else {
        return Vec::new();
    };

    properties
        .iter()
        .map(|(name, prop)| {
            let param_type = prop["type"].as_str().unwrap_or("string");
            let description = prop["description"].as_str().unwrap_or_default();
            let param = if required.contains(&name.as_str()) {
                ParameterSchema::required(name.clone(), param_type, description)
            } else {
                ParameterSchema::optional(name.clone(), param_type, description)
            };
            match prop["enum"].as_array() {
                Some(values) => param.with_enum(values.clone()),
                None => param,
            }
        })
        .collect()
}

#[async_trait]
impl Tool for McpTool {
    fn schema(&self) -> ToolSchema {
        let input_schema = if self.definition.input_schema.is_object() {
            self.definition.input_schema.clone()
        } else {
            serde_json::json!({ "type": "object", "properties": {} })
        };
        ToolSchema {
            name: self.definition.name.clone(),
            description: self.definition.description.clone(),
            parameters: parameters_from_schema(&input_schema),
            input_schema: Some(input_schema),
            category: Some(format!("mcp:{}", self.client.server())),
            has_side_effects: true,
        }
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> CoreResult<ToolResult> {
        let arguments: Map<String, Value> = call.arguments.clone().into_iter().collect();
        let result = self
            .client
            .call_tool(&self.definition.name, Value::Object(arguments))
            .await?;

        let text = result.text();
        Ok(if result.is_error {
            ToolResult::failure(&call.name, text)
        } else {
            ToolResult::success(&call.name, text)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::client::fake;
    use agent_core::testing::ScriptedResolver;
    use agent_core::AgentEnv;
    use serde_json::json;

    fn ctx() -> ToolContext {
        ToolContext {
            depth: 1,
            caller: "github".into(),
            env: Arc::new(AgentEnv::silent(Arc::new(ScriptedResolver::new()))),
        }
    }

    #[test]
    fn schema_properties_become_parameters() {
        let params = parameters_from_schema(&json!({
            "type": "object",
            "properties": {
                "owner": { "type": "string", "description": "Repository owner" },
                "perPage": { "type": "number" },
                "state": { "type": "string", "enum": ["open", "closed"] }
            },
            "required": ["owner"]
        }));
        let owner = params.iter().find(|p| p.name == "owner").unwrap();
        assert!(owner.required);
        let per_page = params.iter().find(|p| p.name == "perPage").unwrap();
        assert!(!per_page.required);
        assert_eq!(per_page.param_type, "number");
        assert!(params.iter().any(|p| p.enum_values.is_some()));
    }

    #[tokio::test]
    async fn tools_forward_calls_to_the_server() {
        let client = Arc::new(
            fake::connect(json!([
                {
                    "name": "list_commits",
                    "description": "List commits",
                    "inputSchema": { "type": "object", "properties": { "repo": { "type": "string" } }, "required": ["repo"] }
                },
                { "name": "always_fails", "description": "Fails" }
            ]))
            .await,
        );
        let tools = McpTool::all(&client);
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].schema().input_schema.unwrap()["required"][0], "repo");
        assert_eq!(tools[1].schema().input_schema.unwrap()["type"], "object");

        let call = ToolCall::parse("c1", "list_commits", r#"{"repo": "concierge"}"#).unwrap();
        let result = tools[0].execute(&call, &ctx()).await.unwrap();
        assert!(result.success);
        assert!(result.output.contains("concierge"));

        let call = ToolCall::parse("c2", "always_fails", "").unwrap();
        let result = tools[1].execute(&call, &ctx()).await.unwrap();
        assert!(!result.success);
    }
}

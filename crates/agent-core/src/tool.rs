//! Tool System
//!
//! Tools are what an agent can do besides talking: leaf tools wrap external
//! calls, delegate tools (see [`crate::delegate`]) run a query against another
//! agent. Every invocation goes through [`ToolRegistry::execute`], which turns
//! any failure into a structured result so nothing escapes into the model loop.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::reasoning::AgentEnv;

/// Parsed tool call, ready for execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool identifier
    pub name: String,

    /// Arguments as key-value pairs
    pub arguments: HashMap<String, Value>,

    /// Optional call ID for tracking
    #[serde(default)]
    pub id: Option<String>,
}

impl ToolCall {
    /// Parse the encoded JSON arguments a model produced.
    ///
    /// An empty payload means "no arguments"; anything else must be a JSON object.
    pub fn parse(
        id: impl Into<String>,
        name: impl Into<String>,
        raw_arguments: &str,
    ) -> Result<Self> {
        let name = name.into();
        let trimmed = raw_arguments.trim();
        let arguments = if trimmed.is_empty() {
            HashMap::new()
        } else {
            match serde_json::from_str::<Value>(trimmed) {
                Ok(Value::Object(map)) => map.into_iter().collect(),
                Ok(other) => {
                    return Err(AgentError::Parse(format!(
                        "arguments for '{name}' must be a JSON object, got {}",
                        json_kind(&other)
                    )));
                }
                Err(e) => {
                    return Err(AgentError::Parse(format!(
                        "arguments for '{name}' are not valid JSON: {e}"
                    )));
                }
            }
        };
        Ok(Self {
            name,
            arguments,
            id: Some(id.into()),
        })
    }

    /// String argument, if present
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }

    /// Required string argument
    pub fn required_str(&self, key: &str) -> Result<&str> {
        self.str_arg(key)
            .ok_or_else(|| AgentError::ToolValidation(format!("Missing required parameter: {key}")))
    }

    /// Integer argument; accepts numbers and numeric strings since models send both
    pub fn int_arg(&self, key: &str) -> Option<i64> {
        match self.arguments.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Float argument; accepts numbers and numeric strings
    pub fn float_arg(&self, key: &str) -> Option<f64> {
        match self.arguments.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Result from tool execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool that was called
    pub name: String,

    /// Call ID (if provided in request)
    pub id: Option<String>,

    /// Whether execution succeeded
    pub success: bool,

    /// Output (success message or error)
    pub output: String,

    /// Structured data (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolResult {
    pub fn success(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            success: true,
            output: output.into(),
            data: None,
        }
    }

    pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            success: false,
            output: error.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The text fed back to the model as this call's result.
    ///
    /// Failures are always a JSON object with `status: "error"` so the model
    /// can tell them apart from ordinary output.
    pub fn to_model_content(&self) -> String {
        if self.success {
            match &self.data {
                Some(data) if self.output.is_empty() => data.to_string(),
                _ => self.output.clone(),
            }
        } else {
            json!({
                "status": "error",
                "tool": self.name,
                "message": self.output,
            })
            .to_string()
        }
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, number, integer, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Default value if not provided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

impl ParameterSchema {
    pub fn required(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: true,
            default: None,
            enum_values: None,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }
}

/// Tool definition schema (for LLM function calling)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,

    /// Raw JSON Schema for tools whose input schema is discovered at runtime.
    /// Takes precedence over `parameters` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,

    /// Category for grouping
    #[serde(default)]
    pub category: Option<String>,

    /// Whether tool has side effects
    #[serde(default)]
    pub has_side_effects: bool,
}

impl ToolSchema {
    /// JSON Schema object describing the tool input
    pub fn json_schema(&self) -> Value {
        if let Some(schema) = &self.input_schema {
            return schema.clone();
        }

        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &self.parameters {
            let mut prop = Map::new();
            prop.insert("type".into(), Value::String(param.param_type.clone()));
            prop.insert("description".into(), Value::String(param.description.clone()));
            if let Some(values) = &param.enum_values {
                prop.insert("enum".into(), Value::Array(values.clone()));
            }
            if let Some(default) = &param.default {
                prop.insert("default".into(), default.clone());
            }
            properties.insert(param.name.clone(), Value::Object(prop));
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    fn required_names(&self) -> Vec<String> {
        if let Some(schema) = &self.input_schema {
            return schema
                .get("required")
                .and_then(Value::as_array)
                .map(|names| {
                    names
                        .iter()
                        .filter_map(|n| n.as_str().map(str::to_owned))
                        .collect()
                })
                .unwrap_or_default();
        }
        self.parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.clone())
            .collect()
    }
}

/// What a tool knows about the invocation it is serving
#[derive(Clone)]
pub struct ToolContext {
    /// Delegation depth of the calling agent (root agent = 0)
    pub depth: usize,

    /// Identity of the calling agent
    pub caller: String,

    /// Shared runtime (backend resolver, callbacks, limits)
    pub env: Arc<AgentEnv>,
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema for LLM function calling
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with given arguments
    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<ToolResult>;

    /// Validate arguments before execution (optional)
    fn validate(&self, call: &ToolCall) -> Result<()> {
        for name in self.schema().required_names() {
            if !call.arguments.contains_key(&name) {
                return Err(AgentError::ToolValidation(format!(
                    "Missing required parameter: {name}"
                )));
            }
        }
        Ok(())
    }
}

/// Ordered registry of the tools bound to one agent.
///
/// Names are unique; registration order is the order schemas are offered
/// to the model.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a new tool; fails if the name is already taken
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<()> {
        self.register_shared(Arc::new(tool))
    }

    /// Register a shared tool; fails if the name is already taken
    pub fn register_shared(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.schema().name;
        if self.get(&name).is_some() {
            return Err(AgentError::Config(format!("duplicate tool name '{name}'")));
        }
        self.tools.push(tool);
        Ok(())
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools
            .iter()
            .find(|t| t.schema().name == name)
            .cloned()
    }

    /// Execute a tool call.
    ///
    /// Never fails: unknown tools, validation failures and tool errors all
    /// come back as a failed [`ToolResult`].
    pub async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> ToolResult {
        let id = call.id.clone().unwrap_or_default();

        let Some(tool) = self.get(&call.name) else {
            tracing::warn!(tool = %call.name, caller = %ctx.caller, "model requested unknown tool");
            return ToolResult::failure(
                &call.name,
                format!(
                    "Unknown tool '{}'. Available tools: {}",
                    call.name,
                    self.names().join(", ")
                ),
            )
            .with_id(id);
        };

        if let Err(e) = tool.validate(call) {
            return ToolResult::failure(&call.name, e.to_string()).with_id(id);
        }

        match tool.execute(call, ctx).await {
            Ok(mut result) => {
                result.id = call.id.clone();
                result
            }
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "tool execution failed");
                ToolResult::failure(&call.name, e.to_string()).with_id(id)
            }
        }
    }

    /// All tool schemas, in registration order
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.schema()).collect()
    }

    /// Tool names, in registration order
    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.schema().name).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Render tool descriptions for backends without native function calling.
///
/// The model is told to answer with a fenced `tool` block that
/// `parse_tool_block` can read back.
pub fn render_tool_prompt(schemas: &[ToolSchema]) -> String {
    let mut prompt = String::from("## Available Tools\n\n");
    prompt.push_str("You can use the following tools by responding with a JSON block:\n\n");
    prompt.push_str(
        "```tool\n{\"tool\": \"tool_name\", \"arguments\": {\"arg\": \"value\"}}\n```\n\n",
    );

    for schema in schemas {
        prompt.push_str(&format!("### {}\n", schema.name));
        prompt.push_str(&format!("{}\n", schema.description));

        if !schema.parameters.is_empty() {
            prompt.push_str("**Parameters:**\n");
            for param in &schema.parameters {
                let required = if param.required { " (required)" } else { "" };
                prompt.push_str(&format!(
                    "- `{}` ({}){}: {}\n",
                    param.name, param.param_type, required, param.description
                ));
            }
        } else if let Some(input) = &schema.input_schema {
            prompt.push_str(&format!("**Input schema:** `{input}`\n"));
        }
        prompt.push('\n');
    }

    prompt
}

/// Extract a tool call written in the fenced-block text protocol.
///
/// Returns the tool name and its encoded arguments, or `None` if the text
/// contains no tool block.
pub fn parse_tool_block(content: &str) -> Option<(String, String)> {
    #[derive(Deserialize)]
    struct Block {
        tool: String,
        #[serde(default)]
        arguments: Value,
    }

    let json_str = content
        .find("```tool")
        .and_then(|start| {
            let after = &content[start + "```tool".len()..];
            after.find("```").map(|end| after[..end].trim())
        })
        .or_else(|| {
            // Fallback: bare JSON object with a "tool" key
            if !content.contains(r#""tool""#) {
                return None;
            }
            let start = content.find('{')?;
            let end = content.rfind('}')?;
            (end > start).then(|| &content[start..=end])
        })?;

    let block: Block = serde_json::from_str(json_str).ok()?;
    let arguments = match block.arguments {
        Value::Null => "{}".to_string(),
        other => other.to_string(),
    };
    Some((block.tool, arguments))
}

// ============================================================================
// Built-in Tools
// ============================================================================

/// DateTime tool - returns current local time so agents can resolve "today", "next week", ...
pub struct DateTimeTool;

#[async_trait]
impl Tool for DateTimeTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "current_time".into(),
            description: "Get the current local date and time".into(),
            parameters: vec![
                ParameterSchema::optional("format", "string", "Output format: 'iso', 'human', or 'unix'")
                    .with_default(json!("human"))
                    .with_enum(vec![json!("iso"), json!("human"), json!("unix")]),
            ],
            input_schema: None,
            category: Some("time".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> Result<ToolResult> {
        let now = chrono::Local::now();

        let output = match call.str_arg("format").unwrap_or("human") {
            "iso" => now.to_rfc3339(),
            "unix" => now.timestamp().to_string(),
            _ => now.format("%A, %B %d, %Y at %H:%M:%S").to_string(),
        };

        Ok(ToolResult::success("current_time", output))
    }
}

//! JSON-RPC 2.0 messages and the MCP structures we use

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::McpError;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.to_owned(),
            params,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    pub id: Option<u64>,
    pub result: Option<Value>,
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// The result payload, or the server's error
    pub fn into_result(self) -> Result<Value, McpError> {
        if let Some(err) = self.error {
            return Err(McpError::Server {
                code: err.code,
                message: err.message,
            });
        }
        self.result.ok_or(McpError::Server {
            code: -32603,
            message: "response missing both result and error".into(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

/// Tool definition from `tools/list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolDefinition {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, rename = "inputSchema")]
    pub input_schema: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListToolsResult {
    #[serde(default)]
    pub tools: Vec<McpToolDefinition>,

    #[serde(default, rename = "nextCursor")]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    pub name: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitializeResult {
    #[serde(default, rename = "protocolVersion")]
    pub protocol_version: Option<String>,

    #[serde(default, rename = "serverInfo")]
    pub server_info: Option<ServerInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Image { #[serde(rename = "mimeType", default)] mime_type: String },
    Resource { resource: Value },
    #[serde(other)]
    Unknown,
}

/// Result of `tools/call`
#[derive(Debug, Clone, Deserialize)]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<ContentBlock>,

    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

impl CallToolResult {
    /// Text blocks joined by newlines; other blocks are summarized
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => text.clone(),
                ContentBlock::Image { mime_type } => format!("[image {mime_type}]"),
                ContentBlock::Resource { resource } => resource
                    .get("text")
                    .and_then(Value::as_str)
                    .map_or_else(|| resource.to_string(), str::to_owned),
                ContentBlock::Unknown => "[unsupported content]".into(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_omits_missing_params() {
        let json = serde_json::to_string(&JsonRpcRequest::new(7, "tools/list", None)).unwrap();
        assert_eq!(json, r#"{"jsonrpc":"2.0","id":7,"method":"tools/list"}"#);
    }

    #[test]
    fn error_response_becomes_server_error() {
        let resp: JsonRpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"no such method"}}"#)
                .unwrap();
        assert!(matches!(resp.into_result(), Err(McpError::Server { code: -32601, .. })));
    }

    #[test]
    fn call_result_text_joins_blocks() {
        let result: CallToolResult = serde_json::from_value(serde_json::json!({
            "content": [
                {"type": "text", "text": "first"},
                {"type": "resource", "resource": {"uri": "repo://x", "text": "second"}},
                {"type": "audio", "data": "..."}
            ],
            "isError": true
        }))
        .unwrap();
        assert!(result.is_error);
        assert_eq!(result.text(), "first\nsecond\n[unsupported content]");
    }
}

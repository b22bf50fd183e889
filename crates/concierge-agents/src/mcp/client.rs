//! MCP client session

use std::process::Stdio;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use super::transport::StdioTransport;
use super::types::{CallToolResult, InitializeResult, ListToolsResult, McpToolDefinition, PROTOCOL_VERSION};
use crate::error::McpError;

/// Servers launched through `npx` may download packages first
const INIT_TIMEOUT: Duration = Duration::from_secs(60);
const CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// How to start a server process
#[derive(Clone, Debug, Default)]
pub struct ServerCommand {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// An initialized session with one MCP server
pub struct McpClient {
    transport: StdioTransport,
    tools: Vec<McpToolDefinition>,
    server_version: Option<String>,
    child: Mutex<Option<Child>>,
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("tools", &self.tools)
            .field("server_version", &self.server_version)
            .finish_non_exhaustive()
    }
}

impl McpClient {
    /// Launch the server and complete the handshake
    pub async fn spawn(server: &ServerCommand) -> Result<Self, McpError> {
        let spawn_error = |reason: String| McpError::Spawn {
            server: server.name.clone(),
            reason,
        };

        let mut child = Command::new(&server.command)
            .args(&server.args)
            .envs(server.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(format!("{}: {e}", server.command)))?;

        let stdin = child.stdin.take().ok_or_else(|| spawn_error("stdin not captured".into()))?;
        let stdout = child.stdout.take().ok_or_else(|| spawn_error("stdout not captured".into()))?;
        tracing::info!(server = %server.name, command = %server.command, "MCP server started");

        let mut client = Self::connect(StdioTransport::new(server.name.clone(), stdin, stdout)).await?;
        client.child = Mutex::new(Some(child));
        Ok(client)
    }

    /// Run the handshake over an existing transport and fetch the tool list
    pub async fn connect(transport: StdioTransport) -> Result<Self, McpError> {
        let init = with_timeout(
            transport.server(),
            "initialize",
            INIT_TIMEOUT,
            transport.request(
                "initialize",
                Some(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": { "name": "concierge", "version": env!("CARGO_PKG_VERSION") },
                })),
            ),
        )
        .await?;
        let init: InitializeResult = decode("initialize", init)?;
        transport.notify("notifications/initialized", None).await?;

        let mut client = Self {
            transport,
            tools: Vec::new(),
            server_version: init.server_info.and_then(|i| i.version),
            child: Mutex::new(None),
        };
        client.tools = client.fetch_tools().await?;
        tracing::info!(
            server = %client.transport.server(),
            protocol = ?init.protocol_version,
            tools = client.tools.len(),
            "MCP session ready"
        );
        Ok(client)
    }

    async fn fetch_tools(&self) -> Result<Vec<McpToolDefinition>, McpError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let page = with_timeout(
                self.transport.server(),
                "tools/list",
                INIT_TIMEOUT,
                self.transport.request("tools/list", params),
            )
            .await?;
            let page: ListToolsResult = decode("tools/list", page)?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(tools),
            }
        }
    }

    pub fn server(&self) -> &str {
        self.transport.server()
    }

    pub fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }

    /// Tools advertised by the server at connect time
    pub fn tools(&self) -> &[McpToolDefinition] {
        &self.tools
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, McpError> {
        tracing::debug!(server = %self.server(), tool = name, "calling MCP tool");
        let result = with_timeout(
            self.server(),
            "tools/call",
            CALL_TIMEOUT,
            self.transport
                .request("tools/call", Some(json!({ "name": name, "arguments": arguments }))),
        )
        .await?;
        decode("tools/call", result)
    }

    /// Stop the server process, if this client started one
    pub async fn shutdown(&self) {
        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(e) = child.kill().await {
                tracing::warn!(server = %self.server(), error = %e, "failed to stop MCP server");
            }
        }
    }
}

async fn with_timeout<F>(server: &str, method: &str, limit: Duration, fut: F) -> Result<Value, McpError>
where
    F: std::future::Future<Output = Result<Value, McpError>>,
{
    tokio::time::timeout(limit, fut).await.map_err(|_| McpError::Timeout {
        server: server.to_owned(),
        method: method.to_owned(),
        seconds: limit.as_secs(),
    })?
}

fn decode<T: serde::de::DeserializeOwned>(method: &str, value: Value) -> Result<T, McpError> {
    serde_json::from_value(value).map_err(|e| McpError::Protocol {
        method: method.to_owned(),
        reason: e.to_string(),
    })
}

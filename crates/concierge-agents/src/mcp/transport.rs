//! Line-delimited JSON-RPC over a byte stream
//!
//! One JSON object per line. A request holds the transport for its whole
//! write-then-read exchange, so concurrent callers never interleave.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use super::types::{JsonRpcRequest, JsonRpcResponse};
use crate::error::McpError;

type Reader = BufReader<Box<dyn AsyncRead + Send + Unpin>>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

pub struct StdioTransport {
    server: String,
    next_id: AtomicU64,
    io: Mutex<(Writer, Reader)>,
}

impl StdioTransport {
    pub fn new<W, R>(server: impl Into<String>, writer: W, reader: R) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
        R: AsyncRead + Send + Unpin + 'static,
    {
        let writer: Writer = Box::new(writer);
        let reader: Box<dyn AsyncRead + Send + Unpin> = Box::new(reader);
        Self {
            server: server.into(),
            next_id: AtomicU64::new(1),
            io: Mutex::new((writer, BufReader::new(reader))),
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    /// Send a request and read lines until the response with the same id.
    /// Non-JSON lines and notifications from the server are skipped.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let line = serde_json::to_string(&JsonRpcRequest::new(id, method, params))
            .map_err(|e| self.transport_error(format!("failed to serialize request: {e}")))?;

        let mut io = self.io.lock().await;
        let (writer, reader) = &mut *io;
        Self::write_line(writer, &line)
            .await
            .map_err(|e| self.transport_error(format!("failed to write {method}: {e}")))?;

        let mut buf = String::new();
        loop {
            buf.clear();
            let read = reader
                .read_line(&mut buf)
                .await
                .map_err(|e| self.transport_error(format!("failed to read response: {e}")))?;
            if read == 0 {
                return Err(self.transport_error("server closed its output".into()));
            }

            let trimmed = buf.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<JsonRpcResponse>(trimmed) {
                Ok(resp) if resp.id == Some(id) => return resp.into_result(),
                Ok(_) => continue,
                Err(_) => {
                    tracing::trace!(server = %self.server, line = trimmed, "skipping non-response line");
                }
            }
        }
    }

    /// Send a notification; no response is read
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let mut message = serde_json::json!({ "jsonrpc": "2.0", "method": method });
        if let Some(params) = params {
            message["params"] = params;
        }
        let mut io = self.io.lock().await;
        Self::write_line(&mut io.0, &message.to_string())
            .await
            .map_err(|e| self.transport_error(format!("failed to write {method}: {e}")))
    }

    async fn write_line(writer: &mut Writer, line: &str) -> std::io::Result<()> {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await
    }

    fn transport_error(&self, reason: String) -> McpError {
        McpError::Transport {
            server: self.server.clone(),
            reason,
        }
    }
}

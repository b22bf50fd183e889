//! Model Context Protocol client
//!
//! Starts an MCP server as a child process, speaks JSON-RPC over its stdio
//! and exposes the advertised tools as ordinary agent tools. Used for the
//! GitHub agent, whose tool set is whatever the server reports.

mod client;
mod tool;
mod transport;
pub mod types;

pub use client::{McpClient, ServerCommand};
pub use tool::McpTool;
pub use transport::StdioTransport;

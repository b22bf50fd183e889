//! # concierge-agents
//!
//! The personal-assistant agents, described as data: system prompts, tool
//! sets and the delegation tree that connects them.
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  agents      AgentFactory → AgentTree (specs + delegates)    │
//! ├──────────────────────────────────────────────────────────────┤
//! │  svckit      leaf tools (movies, books, calendar, files,     │
//! │              recommender)              mcp  GitHub tools     │
//! ├──────────────────────────────────────────────────────────────┤
//! │  store       JSON list documents                             │
//! │  sources     OMDB · OpenLibrary · Substack · YouTube         │
//! │  calendar    Google Calendar REST                            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Configuration comes from one YAML file ([`config::ConciergeConfig`]).

pub mod agents;
pub mod calendar;
pub mod config;
pub mod error;
pub mod mcp;
pub mod model;
pub mod prompts;
pub mod sources;
pub mod store;
pub mod svckit;

pub use agents::{AGENTS, AgentFactory, AgentInfo, AgentTree, Collaborators, agent_info, connect_github};
pub use config::ConciergeConfig;
pub use error::{ConfigError, McpError, Result, ToolError};
pub use store::{Appended, JsonListStore};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::mcp::McpTool;
    pub use crate::svckit::{
        AddChannelTool, AddNewsletterTool, AddToReadingListTool, AddToWatchlistTool, BookListsTool,
        CreateEventTool, FileReadTool, FindFolderTool, GetEventsTool, ListChannelsTool, ListNewslettersTool,
        MarkBookReadTool, MarkWatchedTool, MovieListsTool, RecentPostsTool, RecentVideosTool, SearchBookTool,
        SearchTitlesTool,
    };
}

//! Service Kit - Agent Tools
//!
//! Leaf tools that implement `agent_core::Tool` for the personal-assistant
//! agents: list keeping, catalogue lookups, calendar access and files.

mod books;
mod calendar;
mod files;
mod movies;
mod recommender;

pub use books::{AddToReadingListTool, BookListsTool, MarkBookReadTool, SearchBookTool};
pub use calendar::{CreateEventTool, GetEventsTool};
pub use files::{FileReadTool, FindFolderTool};
pub use movies::{AddToWatchlistTool, MarkWatchedTool, MovieListsTool, SearchTitlesTool};
pub use recommender::{
    AddChannelTool, AddNewsletterTool, ListChannelsTool, ListNewslettersTool, RecentPostsTool, RecentVideosTool,
};

use agent_core::ToolCall;

use crate::error::ToolError;

/// Trimmed string argument; blank counts as absent
fn optional_text(call: &ToolCall, key: &str) -> Option<String> {
    call.str_arg(key)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Optional `rating` argument, 0 to 10
fn rating_arg(call: &ToolCall) -> Result<Option<f64>, ToolError> {
    match call.float_arg("rating") {
        Some(r) if !(0.0..=10.0).contains(&r) => Err(ToolError::InvalidInput(format!(
            "rating must be between 0 and 10, got {r}"
        ))),
        rating => Ok(rating),
    }
}

/// `8` rather than `8.0`, `7.5` as is
fn format_rating(rating: f64) -> String {
    if rating.fract() == 0.0 {
        format!("{rating:.0}")
    } else {
        rating.to_string()
    }
}

/// `limit` argument clamped to `1..=max`
fn limit_arg(call: &ToolCall, default: usize, max: usize) -> usize {
    call.int_arg("limit")
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(default)
        .clamp(1, max)
}

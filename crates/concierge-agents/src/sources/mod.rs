//! Catalogue and feed lookups
//!
//! Narrow interfaces over the public APIs the leisure tools consult. Each
//! has one HTTP implementation; tests substitute their own.

mod omdb;
mod openlibrary;
mod substack;
mod youtube;

pub use omdb::OmdbClient;
pub use openlibrary::OpenLibraryClient;
pub use substack::SubstackClient;
pub use youtube::{ChannelRef, YouTubeClient, channel_reference, duration_minutes};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ToolError};

/// Movie/show search request
#[derive(Clone, Debug, Default)]
pub struct TitleQuery {
    pub title: String,
    pub year: Option<String>,

    /// `movie`, `series` or `episode`
    pub kind: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TitleMatch {
    pub title: String,
    pub year: String,
    pub imdb_id: String,
    pub kind: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BookMatch {
    pub title: String,
    pub authors: Vec<String>,
    pub first_publish_year: Option<i64>,
    pub pages: Option<u32>,
    pub subjects: Vec<String>,
    pub key: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub title: String,
    pub subtitle: Option<String>,
    pub url: Option<String>,
    pub published: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoSummary {
    pub title: String,
    pub url: String,
    pub published_at: Option<String>,
    pub duration_minutes: Option<f64>,
    pub views: Option<u64>,
}

/// Movie and show metadata (OMDB)
#[async_trait]
pub trait TitleCatalog: Send + Sync {
    /// Matching titles; empty when the catalogue knows none
    async fn search_titles(&self, query: &TitleQuery) -> Result<Vec<TitleMatch>>;
}

/// Book metadata (OpenLibrary)
#[async_trait]
pub trait BookCatalog: Send + Sync {
    async fn search_books(&self, title: &str, author: Option<&str>, limit: usize) -> Result<Vec<BookMatch>>;
}

/// Recent newsletter posts (Substack)
#[async_trait]
pub trait PostFeed: Send + Sync {
    async fn recent_posts(&self, newsletter_url: &str, limit: usize) -> Result<Vec<PostSummary>>;
}

/// Recent channel uploads (YouTube)
#[async_trait]
pub trait VideoFeed: Send + Sync {
    async fn recent_videos(&self, channel_url: &str, limit: usize) -> Result<Vec<VideoSummary>>;
}

/// API key from the environment, or a `MissingCredential` error naming the variable
pub(crate) fn api_key(var: &str) -> Result<String> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ToolError::MissingCredential(var.to_owned()))
}

/// Map a non-success HTTP status to an upstream error
pub(crate) async fn check_status(service: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(200).collect();
    Err(ToolError::upstream(service, format!("HTTP {status}: {snippet}")))
}

//! Substack public archive client

use async_trait::async_trait;
use serde::Deserialize;

use super::{PostFeed, PostSummary, check_status};
use crate::error::{Result, ToolError};

#[derive(Debug, Deserialize)]
struct Post {
    title: String,
    subtitle: Option<String>,
    canonical_url: Option<String>,
    post_date: Option<String>,
}

pub struct SubstackClient {
    http: reqwest::Client,
}

impl SubstackClient {
    pub const fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

/// Archive endpoint for a newsletter URL (`https://x.substack.com/p/...` → `https://x.substack.com/api/v1/archive`)
pub(crate) fn archive_url(newsletter_url: &str) -> Result<String> {
    let trimmed = newsletter_url.trim();
    if trimmed.is_empty() {
        return Err(ToolError::InvalidInput("newsletter_url is empty".into()));
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_owned()
    } else {
        format!("https://{trimmed}")
    };
    let (scheme, rest) = with_scheme
        .split_once("://")
        .ok_or_else(|| ToolError::InvalidInput(format!("not a URL: {newsletter_url}")))?;
    let host = rest.split('/').next().unwrap_or_default();
    if host.is_empty() {
        return Err(ToolError::InvalidInput(format!("not a URL: {newsletter_url}")));
    }
    Ok(format!("{scheme}://{host}/api/v1/archive"))
}

#[async_trait]
impl PostFeed for SubstackClient {
    async fn recent_posts(&self, newsletter_url: &str, limit: usize) -> Result<Vec<PostSummary>> {
        let url = archive_url(newsletter_url)?;
        tracing::info!(%url, limit, "fetching Substack archive");
        let response = self
            .http
            .get(&url)
            .query(&[("sort", "new"), ("offset", "0"), ("limit", limit.to_string().as_str())])
            .send()
            .await?;
        let posts: Vec<Post> = check_status("Substack", response).await?.json().await?;
        Ok(posts
            .into_iter()
            .take(limit)
            .map(|p| PostSummary {
                title: p.title,
                subtitle: p.subtitle.filter(|s| !s.is_empty()),
                url: p.canonical_url,
                published: p.post_date,
            })
            .collect())
    }
}

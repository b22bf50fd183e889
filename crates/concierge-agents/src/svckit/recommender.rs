//! Recommender Tools
//!
//! Registries of monitored Substack newsletters and YouTube channels, and
//! lookups of their latest posts and uploads.

use std::sync::Arc;

use agent_core::{
    Result as CoreResult, Tool, ToolCall, ToolContext, ToolResult,
    tool::{ParameterSchema, ToolSchema},
};
use async_trait::async_trait;
use serde_json::json;

use super::limit_arg;
use crate::model::{Subscription, lists};
use crate::sources::{PostFeed, VideoFeed};
use crate::store::{Appended, JsonListStore};

async fn add_subscription(
    store: &JsonListStore,
    list: &str,
    label: &str,
    call: &ToolCall,
    url_key: &str,
    note_key: &str,
) -> CoreResult<ToolResult> {
    let url = call.required_str(url_key)?.trim().to_owned();
    let note = call.str_arg(note_key).unwrap_or_default().trim().to_owned();

    let outcome = store
        .append_item(list, Subscription::new(url.clone(), note), |s: &Subscription| s.same_url(&url))
        .await?;
    Ok(match outcome {
        Appended::Added => {
            tracing::info!(%url, list, "now monitoring");
            ToolResult::success(&call.name, format!("{label} {url} has been added to your monitoring list."))
        }
        Appended::AlreadyPresent => {
            ToolResult::success(&call.name, format!("{label} {url} is already in the monitoring list."))
        }
    })
}

async fn list_subscriptions(store: &JsonListStore, list: &str, call: &ToolCall) -> CoreResult<ToolResult> {
    let entries: Vec<Subscription> = store.read_list(list).await?;
    let data = serde_json::to_value(&entries)?;
    Ok(ToolResult::success(&call.name, serde_json::to_string_pretty(&data)?).with_data(data))
}

/// `add_substack_newsletter_to_monitor`
pub struct AddNewsletterTool {
    store: Arc<JsonListStore>,
}

impl AddNewsletterTool {
    pub const fn new(store: Arc<JsonListStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for AddNewsletterTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "add_substack_newsletter_to_monitor".into(),
            description: "Add a Substack newsletter to the monitoring list.".into(),
            parameters: vec![
                ParameterSchema::required("newsletter_url", "string", "URL of the Substack newsletter"),
                ParameterSchema::required(
                    "note_about_newsletter",
                    "string",
                    "Who or what it is, e.g. \"Dylan Patel's substack\"",
                ),
            ],
            input_schema: None,
            category: Some("recommender".into()),
            has_side_effects: true,
        }
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> CoreResult<ToolResult> {
        add_subscription(
            &self.store,
            lists::NEWSLETTERS,
            "Newsletter",
            call,
            "newsletter_url",
            "note_about_newsletter",
        )
        .await
    }
}

/// `get_all_newsletters`
pub struct ListNewslettersTool {
    store: Arc<JsonListStore>,
}

impl ListNewslettersTool {
    pub const fn new(store: Arc<JsonListStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ListNewslettersTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_all_newsletters".into(),
            description: "List every monitored Substack newsletter with its note.".into(),
            parameters: vec![],
            input_schema: None,
            category: Some("recommender".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> CoreResult<ToolResult> {
        list_subscriptions(&self.store, lists::NEWSLETTERS, call).await
    }
}

/// `get_recent_posts_from_newsletter`
pub struct RecentPostsTool {
    feed: Arc<dyn PostFeed>,
}

impl RecentPostsTool {
    pub fn new(feed: Arc<dyn PostFeed>) -> Self {
        Self { feed }
    }
}

#[async_trait]
impl Tool for RecentPostsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_recent_posts_from_newsletter".into(),
            description: "Fetch the most recent posts (title, subtitle, link, date) of a Substack newsletter.".into(),
            parameters: vec![
                ParameterSchema::required("newsletter_url", "string", "URL of the Substack newsletter"),
                ParameterSchema::optional("limit", "integer", "Number of posts").with_default(json!(5)),
            ],
            input_schema: None,
            category: Some("recommender".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> CoreResult<ToolResult> {
        let url = call.required_str("newsletter_url")?.trim();
        let limit = limit_arg(call, 5, 25);

        match self.feed.recent_posts(url, limit).await {
            Ok(posts) => {
                tracing::debug!(%url, count = posts.len(), "fetched newsletter posts");
                let data = serde_json::to_value(&posts)?;
                Ok(ToolResult::success(&call.name, serde_json::to_string_pretty(&data)?).with_data(data))
            }
            Err(e) => Ok(ToolResult::failure(&call.name, format!("Error fetching posts from {url}: {e}"))),
        }
    }
}

/// `get_recent_youtube_videos`
pub struct RecentVideosTool {
    feed: Arc<dyn VideoFeed>,
}

impl RecentVideosTool {
    pub fn new(feed: Arc<dyn VideoFeed>) -> Self {
        Self { feed }
    }
}

#[async_trait]
impl Tool for RecentVideosTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_recent_youtube_videos".into(),
            description: "Fetch the most recent uploads (title, link, date, length in minutes, views) of a YouTube \
                          channel."
                .into(),
            parameters: vec![
                ParameterSchema::required("channel_url", "string", "Channel URL or @handle"),
                ParameterSchema::optional("limit", "integer", "Number of videos").with_default(json!(10)),
            ],
            input_schema: None,
            category: Some("recommender".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> CoreResult<ToolResult> {
        let channel = call.required_str("channel_url")?.trim();
        let limit = limit_arg(call, 10, 50);

        match self.feed.recent_videos(channel, limit).await {
            Ok(videos) => {
                tracing::debug!(%channel, count = videos.len(), "fetched channel uploads");
                let data = serde_json::to_value(&videos)?;
                Ok(ToolResult::success(&call.name, serde_json::to_string_pretty(&data)?).with_data(data))
            }
            Err(e) => Ok(ToolResult::failure(
                &call.name,
                format!("Error fetching videos from channel {channel}: {e}"),
            )),
        }
    }
}

/// `get_all_monitored_youtube_channels`
pub struct ListChannelsTool {
    store: Arc<JsonListStore>,
}

impl ListChannelsTool {
    pub const fn new(store: Arc<JsonListStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ListChannelsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_all_monitored_youtube_channels".into(),
            description: "List every monitored YouTube channel with its note.".into(),
            parameters: vec![],
            input_schema: None,
            category: Some("recommender".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> CoreResult<ToolResult> {
        list_subscriptions(&self.store, lists::CHANNELS, call).await
    }
}

/// `add_youtube_channel_to_monitor`
pub struct AddChannelTool {
    store: Arc<JsonListStore>,
}

impl AddChannelTool {
    pub const fn new(store: Arc<JsonListStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for AddChannelTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "add_youtube_channel_to_monitor".into(),
            description: "Add a YouTube channel to the monitoring list.".into(),
            parameters: vec![
                ParameterSchema::required("channel_url", "string", "Channel URL or @handle"),
                ParameterSchema::required(
                    "note_about_channel",
                    "string",
                    "Who or what it is, e.g. \"Ezra Klein's show (Favorite Podcast)\"",
                ),
            ],
            input_schema: None,
            category: Some("recommender".into()),
            has_side_effects: true,
        }
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> CoreResult<ToolResult> {
        add_subscription(&self.store, lists::CHANNELS, "Channel", call, "channel_url", "note_about_channel").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, ToolError};
    use crate::sources::{PostSummary, VideoSummary};
    use crate::svckit::test_support::invoke;

    struct OnePost;

    #[async_trait]
    impl PostFeed for OnePost {
        async fn recent_posts(&self, _url: &str, limit: usize) -> Result<Vec<PostSummary>> {
            Ok((0..limit.min(1))
                .map(|_| PostSummary {
                    title: "Scaling laws".into(),
                    subtitle: None,
                    url: Some("https://example.substack.com/p/scaling".into()),
                    published: Some("2025-03-01T08:00:00Z".into()),
                })
                .collect())
        }
    }

    struct NoKey;

    #[async_trait]
    impl VideoFeed for NoKey {
        async fn recent_videos(&self, _channel: &str, _limit: usize) -> Result<Vec<VideoSummary>> {
            Err(ToolError::MissingCredential("YOUTUBE_API_KEY".into()))
        }
    }

    #[tokio::test]
    async fn newsletters_are_registered_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonListStore::new(dir.path().join("newsletters.json")));
        let add = AddNewsletterTool::new(Arc::clone(&store));

        let first = invoke(
            &add,
            r#"{"newsletter_url": "https://www.semianalysis.com/", "note_about_newsletter": "Dylan Patel's substack"}"#,
        )
        .await;
        assert_eq!(first.output, "Newsletter https://www.semianalysis.com/ has been added to your monitoring list.");
        let again = invoke(&add, r#"{"newsletter_url": "semianalysis.com", "note_about_newsletter": "dup"}"#).await;
        assert_eq!(again.output, "Newsletter semianalysis.com is already in the monitoring list.");

        let listed = invoke(&ListNewslettersTool::new(store), "").await;
        let data = listed.data.unwrap();
        assert_eq!(data.as_array().unwrap().len(), 1);
        assert_eq!(data[0]["note"], "Dylan Patel's substack");
    }

    #[tokio::test]
    async fn channels_live_in_their_own_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonListStore::new(dir.path().join("youtube_channels.json")));
        let added = invoke(
            &AddChannelTool::new(Arc::clone(&store)),
            r#"{"channel_url": "@EzraKleinShow", "note_about_channel": "Ezra Klein's show (Favorite Podcast)"}"#,
        )
        .await;
        assert!(added.output.ends_with("has been added to your monitoring list."));
        let listed = invoke(&ListChannelsTool::new(store), "{}").await;
        assert!(listed.output.contains("@EzraKleinShow"));
    }

    #[tokio::test]
    async fn feed_results_and_failures() {
        let posts = invoke(
            &RecentPostsTool::new(Arc::new(OnePost)),
            r#"{"newsletter_url": "https://example.substack.com"}"#,
        )
        .await;
        assert!(posts.success);
        assert_eq!(posts.data.unwrap()[0]["title"], "Scaling laws");

        let videos = invoke(&RecentVideosTool::new(Arc::new(NoKey)), r#"{"channel_url": "@someone"}"#).await;
        assert!(!videos.success);
        assert!(videos.output.contains("YOUTUBE_API_KEY"));
    }
}

//! YouTube Data API client

use async_trait::async_trait;
use serde_json::Value;

use super::{VideoFeed, VideoSummary, api_key, check_status};
use crate::error::{Result, ToolError};

pub const YOUTUBE_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
pub const YOUTUBE_API_KEY_ENV: &str = "YOUTUBE_API_KEY";

/// How a channel was named by the user
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelRef {
    Id(String),
    Handle(String),
    Username(String),
}

/// Classify a channel URL, handle or id
pub fn channel_reference(input: &str) -> Option<ChannelRef> {
    let input = input.trim().trim_end_matches('/');
    if input.is_empty() {
        return None;
    }
    if let Some(handle) = input.strip_prefix('@') {
        return Some(ChannelRef::Handle(format!("@{handle}")));
    }
    if input.starts_with("UC") && !input.contains('/') {
        return Some(ChannelRef::Id(input.to_owned()));
    }

    let path = input.split_once("youtube.com/").map(|(_, p)| p)?;
    let mut segments = path.split(['/', '?']).filter(|s| !s.is_empty());
    match segments.next()? {
        s if s.starts_with('@') => Some(ChannelRef::Handle(s.to_owned())),
        "channel" => segments.next().map(|id| ChannelRef::Id(id.to_owned())),
        "user" | "c" => segments.next().map(|name| ChannelRef::Username(name.to_owned())),
        _ => None,
    }
}

/// ISO 8601 duration (`PT1H4M13S`) in minutes
pub fn duration_minutes(iso: &str) -> Option<f64> {
    let rest = iso.strip_prefix('P')?;
    let mut seconds = 0.0;
    let mut number = String::new();
    let mut in_time = false;
    for c in rest.chars() {
        match c {
            'T' => in_time = true,
            '0'..='9' | '.' => number.push(c),
            unit => {
                let value: f64 = number.parse().ok()?;
                number.clear();
                seconds += value
                    * match (unit, in_time) {
                        ('W', false) => 604_800.0,
                        ('D', false) => 86_400.0,
                        ('H', true) => 3_600.0,
                        ('M', true) => 60.0,
                        ('S', true) => 1.0,
                        _ => return None,
                    };
            }
        }
    }
    number.is_empty().then_some(seconds / 60.0)
}

pub struct YouTubeClient {
    http: reqwest::Client,
    base_url: String,
    api_key_env: String,
}

impl YouTubeClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: YOUTUBE_BASE_URL.into(),
            api_key_env: YOUTUBE_API_KEY_ENV.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get(&self, resource: &str, params: &[(&str, &str)], key: &str) -> Result<Value> {
        let url = format!("{}/{resource}", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .get(url)
            .query(params)
            .query(&[("key", key)])
            .send()
            .await?;
        Ok(check_status("YouTube", response).await?.json().await?)
    }

    async fn channel_id(&self, reference: ChannelRef, key: &str) -> Result<String> {
        let (param, value) = match reference {
            ChannelRef::Id(id) => return Ok(id),
            ChannelRef::Handle(handle) => ("forHandle", handle),
            ChannelRef::Username(name) => ("forUsername", name),
        };
        let body = self.get("channels", &[("part", "id"), (param, value.as_str())], key).await?;
        body["items"][0]["id"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| ToolError::upstream("YouTube", format!("no channel found for {value}")))
    }
}

fn summarize(video: &Value) -> VideoSummary {
    let id = video["id"].as_str().unwrap_or_default();
    VideoSummary {
        title: video["snippet"]["title"].as_str().unwrap_or_default().to_owned(),
        url: format!("https://www.youtube.com/watch?v={id}"),
        published_at: video["snippet"]["publishedAt"].as_str().map(str::to_owned),
        duration_minutes: video["contentDetails"]["duration"]
            .as_str()
            .and_then(duration_minutes)
            .map(|m| (m * 10.0).round() / 10.0),
        views: video["statistics"]["viewCount"]
            .as_str()
            .and_then(|v| v.parse().ok()),
    }
}

#[async_trait]
impl VideoFeed for YouTubeClient {
    async fn recent_videos(&self, channel_url: &str, limit: usize) -> Result<Vec<VideoSummary>> {
        let reference = channel_reference(channel_url)
            .ok_or_else(|| ToolError::InvalidInput(format!("not a YouTube channel: {channel_url}")))?;
        let key = api_key(&self.api_key_env)?;
        let channel_id = self.channel_id(reference, &key).await?;
        tracing::info!(%channel_id, limit, "fetching recent YouTube uploads");

        let channel = self
            .get("channels", &[("part", "contentDetails"), ("id", channel_id.as_str())], &key)
            .await?;
        let uploads = channel["items"][0]["contentDetails"]["relatedPlaylists"]["uploads"]
            .as_str()
            .ok_or_else(|| ToolError::upstream("YouTube", format!("channel {channel_id} has no uploads playlist")))?
            .to_owned();

        let max_results = limit.clamp(1, 50).to_string();
        let playlist = self
            .get(
                "playlistItems",
                &[("part", "snippet"), ("playlistId", uploads.as_str()), ("maxResults", max_results.as_str())],
                &key,
            )
            .await?;
        let ids: Vec<&str> = playlist["items"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|i| i["snippet"]["resourceId"]["videoId"].as_str())
                    .collect()
            })
            .unwrap_or_default();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let joined = ids.join(",");
        let videos = self
            .get(
                "videos",
                &[("part", "snippet,contentDetails,statistics"), ("id", joined.as_str())],
                &key,
            )
            .await?;
        Ok(videos["items"]
            .as_array()
            .map(|items| items.iter().map(summarize).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_references() {
        assert_eq!(channel_reference("@ezraklein"), Some(ChannelRef::Handle("@ezraklein".into())));
        assert_eq!(
            channel_reference("https://www.youtube.com/@ezraklein/videos"),
            Some(ChannelRef::Handle("@ezraklein".into()))
        );
        assert_eq!(
            channel_reference("https://youtube.com/channel/UCabc123/"),
            Some(ChannelRef::Id("UCabc123".into()))
        );
        assert_eq!(
            channel_reference("youtube.com/user/vsauce"),
            Some(ChannelRef::Username("vsauce".into()))
        );
        assert_eq!(channel_reference("https://example.com/@x"), None);
    }

    #[test]
    fn iso_durations() {
        assert!((duration_minutes("PT4M13S").unwrap() - 4.216_666).abs() < 1e-3);
        assert!((duration_minutes("PT1H").unwrap() - 60.0).abs() < f64::EPSILON);
        assert!((duration_minutes("P1DT1M").unwrap() - 1441.0).abs() < f64::EPSILON);
        assert_eq!(duration_minutes("4:13"), None);
        assert_eq!(duration_minutes("PT4"), None);
    }

    #[test]
    fn video_summary() {
        let video = serde_json::json!({
            "id": "abc",
            "snippet": {"title": "Episode 1", "publishedAt": "2025-01-01T00:00:00Z"},
            "contentDetails": {"duration": "PT1H2M"},
            "statistics": {"viewCount": "1234"}
        });
        let summary = summarize(&video);
        assert_eq!(summary.url, "https://www.youtube.com/watch?v=abc");
        assert_eq!(summary.duration_minutes, Some(62.0));
        assert_eq!(summary.views, Some(1234));
    }
}

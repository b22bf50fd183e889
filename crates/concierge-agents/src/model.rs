//! Domain Models
//!
//! Entries kept in the flat JSON list documents. Unknown fields written by
//! hand or by older versions are carried through untouched.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Calendar date in the `YYYY-MM-DD` form used by every list document
pub fn today() -> String {
    Local::now().date_naive().format("%Y-%m-%d").to_string()
}

/// Parse a `YYYY-MM-DD` date written by [`today`]
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// Case-insensitive title comparison used for duplicate and lookup checks
pub fn same_title(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// A movie or show on the watchlist or in the watch history
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WatchEntry {
    pub title: String,

    #[serde(default)]
    pub year: Option<i64>,

    #[serde(default)]
    pub genre: Option<String>,

    /// Director or showrunner
    #[serde(default)]
    pub director: Option<String>,

    #[serde(default)]
    pub notes: Option<String>,

    #[serde(default)]
    pub added_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watched_date: Option<String>,

    /// Rating out of 10
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WatchEntry {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            added_date: Some(today()),
            ..Self::default()
        }
    }
}

/// A book on the reading list or in the reading history
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BookEntry {
    pub title: String,

    #[serde(default)]
    pub author: Option<String>,

    #[serde(default)]
    pub genre: Option<String>,

    #[serde(default)]
    pub pages: Option<u32>,

    #[serde(default)]
    pub notes: Option<String>,

    #[serde(default)]
    pub added_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_date: Option<String>,

    /// Rating out of 10
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BookEntry {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            added_date: Some(today()),
            ..Self::default()
        }
    }

    /// Title match, narrowed by author when both sides know it
    pub fn matches(&self, title: &str, author: Option<&str>) -> bool {
        if !same_title(&self.title, title) {
            return false;
        }
        match (self.author.as_deref(), author) {
            (Some(ours), Some(theirs)) => same_title(ours, theirs),
            _ => true,
        }
    }
}

/// A monitored newsletter or channel
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub url: String,

    /// What the user said about it ("Dylan Patel's substack")
    #[serde(default)]
    pub note: String,

    #[serde(default)]
    pub added_date: Option<String>,
}

impl Subscription {
    pub fn new(url: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            note: note.into(),
            added_date: Some(today()),
        }
    }

    /// URLs compare without scheme, `www.` or trailing slash
    pub fn same_url(&self, other: &str) -> bool {
        normalize_url(&self.url) == normalize_url(other)
    }
}

fn normalize_url(url: &str) -> String {
    let url = url.trim().to_lowercase();
    let url = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(&url);
    let url = url.strip_prefix("www.").unwrap_or(url);
    url.trim_end_matches('/').to_owned()
}

/// Named lists inside each document
pub mod lists {
    pub const TO_WATCH: &str = "to_watch";
    pub const WATCHED: &str = "watched";
    pub const TO_READ: &str = "to_read";
    pub const READ: &str = "read";
    pub const NEWSLETTERS: &str = "newsletters";
    pub const CHANNELS: &str = "channels";
}

/// Document file names under the data directory
pub mod documents {
    pub const MOVIES: &str = "movies_and_shows.json";
    pub const BOOKS: &str = "books.json";
    pub const NEWSLETTERS: &str = "newsletters.json";
    pub const CHANNELS: &str = "youtube_channels.json";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let raw = serde_json::json!({
            "title": "Arrival",
            "year": 2016,
            "imdb_id": "tt2543164"
        });
        let entry: WatchEntry = serde_json::from_value(raw).unwrap();
        assert_eq!(entry.year, Some(2016));
        let back = serde_json::to_value(&entry).unwrap();
        assert_eq!(back["imdb_id"], "tt2543164");
        assert!(back.get("watched_date").is_none());
    }

    #[test]
    fn new_entries_are_dated_today() {
        let entry = WatchEntry::new("Dune");
        let date = entry.added_date.as_deref().and_then(parse_date).unwrap();
        assert_eq!(date, Local::now().date_naive());
    }

    #[test]
    fn book_match_uses_author_only_when_known() {
        let mut book = BookEntry::new("Dune");
        assert!(book.matches("dune", Some("Frank Herbert")));
        book.author = Some("Frank Herbert".into());
        assert!(book.matches("DUNE ", Some("frank herbert")));
        assert!(!book.matches("Dune", Some("Brian Herbert")));
        assert!(book.matches("Dune", None));
    }

    #[test]
    fn subscription_urls_compare_loosely() {
        let sub = Subscription::new("https://www.semianalysis.com/", "Dylan Patel");
        assert!(sub.same_url("semianalysis.com"));
        assert!(sub.same_url("http://SemiAnalysis.com"));
        assert!(!sub.same_url("https://stratechery.com"));
    }
}

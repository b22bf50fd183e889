//! OMDB search client

use async_trait::async_trait;
use serde::Deserialize;

use super::{TitleCatalog, TitleMatch, TitleQuery, api_key, check_status};
use crate::error::{Result, ToolError};

pub const OMDB_BASE_URL: &str = "http://www.omdbapi.com/";
pub const OMDB_API_KEY_ENV: &str = "OMDB_API_KEY";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "Response")]
    response: String,

    #[serde(rename = "Search", default)]
    search: Vec<SearchItem>,

    #[serde(rename = "Error")]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(rename = "Title")]
    title: String,

    #[serde(rename = "Year", default)]
    year: String,

    #[serde(rename = "imdbID", default)]
    imdb_id: String,

    #[serde(rename = "Type", default)]
    kind: String,
}

pub struct OmdbClient {
    http: reqwest::Client,
    base_url: String,
    api_key_env: String,
}

impl OmdbClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: OMDB_BASE_URL.into(),
            api_key_env: OMDB_API_KEY_ENV.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

fn into_matches(body: SearchResponse) -> Result<Vec<TitleMatch>> {
    if body.response.eq_ignore_ascii_case("true") {
        return Ok(body
            .search
            .into_iter()
            .map(|item| TitleMatch {
                title: item.title,
                year: item.year,
                imdb_id: item.imdb_id,
                kind: item.kind,
            })
            .collect());
    }
    match body.error {
        Some(error) if error.to_lowercase().contains("not found") => Ok(Vec::new()),
        Some(error) => Err(ToolError::upstream("OMDB", error)),
        None => Err(ToolError::upstream("OMDB", "unknown error")),
    }
}

#[async_trait]
impl TitleCatalog for OmdbClient {
    async fn search_titles(&self, query: &TitleQuery) -> Result<Vec<TitleMatch>> {
        let key = api_key(&self.api_key_env)?;
        let mut params = vec![
            ("apikey", key),
            ("s", query.title.clone()),
            ("plot", "short".to_owned()),
        ];
        if let Some(year) = query.year.as_ref().filter(|y| !y.is_empty()) {
            params.push(("y", year.clone()));
        }
        if let Some(kind) = query.kind.as_ref().filter(|k| !k.is_empty()) {
            params.push(("type", kind.clone()));
        }

        tracing::info!(title = %query.title, year = ?query.year, kind = ?query.kind, "searching OMDB");
        let response = self.http.get(&self.base_url).query(&params).send().await?;
        let body: SearchResponse = check_status("OMDB", response).await?.json().await?;
        let matches = into_matches(body)?;
        tracing::debug!(count = matches.len(), "OMDB matches");
        Ok(matches)
    }
}

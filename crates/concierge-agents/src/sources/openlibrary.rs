//! OpenLibrary search client

use async_trait::async_trait;
use serde::Deserialize;

use super::{BookCatalog, BookMatch, check_status};
use crate::error::Result;

pub const OPENLIBRARY_BASE_URL: &str = "https://openlibrary.org";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<Doc>,
}

#[derive(Debug, Deserialize)]
struct Doc {
    title: String,

    #[serde(default)]
    author_name: Vec<String>,

    first_publish_year: Option<i64>,
    number_of_pages_median: Option<u32>,

    #[serde(default)]
    subject: Vec<String>,

    key: Option<String>,
}

pub struct OpenLibraryClient {
    http: reqwest::Client,
    base_url: String,
}

impl OpenLibraryClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: OPENLIBRARY_BASE_URL.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

fn into_matches(body: SearchResponse) -> Vec<BookMatch> {
    body.docs
        .into_iter()
        .map(|doc| BookMatch {
            title: doc.title,
            authors: doc.author_name,
            first_publish_year: doc.first_publish_year,
            pages: doc.number_of_pages_median,
            subjects: doc.subject.into_iter().take(5).collect(),
            key: doc.key,
        })
        .collect()
}

#[async_trait]
impl BookCatalog for OpenLibraryClient {
    async fn search_books(&self, title: &str, author: Option<&str>, limit: usize) -> Result<Vec<BookMatch>> {
        let mut params = vec![
            ("title", title.to_owned()),
            ("limit", limit.to_string()),
            (
                "fields",
                "title,author_name,first_publish_year,number_of_pages_median,subject,key".to_owned(),
            ),
        ];
        if let Some(author) = author.filter(|a| !a.trim().is_empty()) {
            params.push(("author", author.to_owned()));
        }

        tracing::info!(title, author = ?author, "searching OpenLibrary");
        let url = format!("{}/search.json", self.base_url.trim_end_matches('/'));
        let response = self.http.get(url).query(&params).send().await?;
        let body: SearchResponse = check_status("OpenLibrary", response).await?.json().await?;
        Ok(into_matches(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docs_are_trimmed_to_useful_fields() {
        let body: SearchResponse = serde_json::from_value(serde_json::json!({
            "numFound": 1,
            "docs": [{
                "title": "Dune",
                "author_name": ["Frank Herbert"],
                "first_publish_year": 1965,
                "number_of_pages_median": 604,
                "subject": ["Science fiction", "Deserts", "Ecology", "Politics", "Religion", "Spice"],
                "key": "/works/OL893415W"
            }]
        }))
        .unwrap();
        let matches = into_matches(body);
        assert_eq!(matches[0].authors, ["Frank Herbert"]);
        assert_eq!(matches[0].pages, Some(604));
        assert_eq!(matches[0].subjects.len(), 5);
    }
}

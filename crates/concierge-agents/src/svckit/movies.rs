//! Movie & Show Tools
//!
//! Watchlist and watch history in `movies_and_shows.json`, plus OMDB search.

use std::sync::Arc;

use agent_core::{
    Result as CoreResult, Tool, ToolCall, ToolContext, ToolResult,
    tool::{ParameterSchema, ToolSchema},
};
use async_trait::async_trait;
use serde_json::json;

use super::{format_rating, optional_text, rating_arg};
use crate::model::{WatchEntry, lists, same_title, today};
use crate::sources::{TitleCatalog, TitleQuery};
use crate::store::{Appended, JsonListStore};

/// `get_movies_and_show_list`
pub struct MovieListsTool {
    store: Arc<JsonListStore>,
}

impl MovieListsTool {
    pub const fn new(store: Arc<JsonListStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for MovieListsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_movies_and_show_list".into(),
            description: "Get the complete watchlist (to_watch) and watch history (watched, with ratings and notes). \
                          Call this first for any recommendation or history question; it is enough on its own to \
                          suggest what to watch."
                .into(),
            parameters: vec![],
            input_schema: None,
            category: Some("movies".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> CoreResult<ToolResult> {
        let mut found = self
            .store
            .read_lists::<WatchEntry>(&[lists::TO_WATCH, lists::WATCHED])
            .await?
            .into_iter();
        let to_watch = found.next().unwrap_or_default();
        let watched = found.next().unwrap_or_default();

        let mut output = format!(
            "MOVIE DATA (To Watch: {}, Watched: {})\n",
            to_watch.len(),
            watched.len()
        );
        output.push_str(&"=".repeat(50));
        output.push_str("\n\n");
        output.push_str(&serde_json::to_string_pretty(&json!({
            lists::TO_WATCH: to_watch,
            lists::WATCHED: watched,
        }))?);

        Ok(ToolResult::success(&call.name, output))
    }
}

/// `add_movie_or_show_to_watchlist`
pub struct AddToWatchlistTool {
    store: Arc<JsonListStore>,
}

impl AddToWatchlistTool {
    pub const fn new(store: Arc<JsonListStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for AddToWatchlistTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "add_movie_or_show_to_watchlist".into(),
            description: "Add a movie or show to the watchlist. Titles already on the watchlist are not added twice."
                .into(),
            parameters: vec![
                ParameterSchema::required("title", "string", "Movie or show title"),
                ParameterSchema::optional("year", "integer", "Release year"),
                ParameterSchema::optional("genre", "string", "Genre"),
                ParameterSchema::optional("director", "string", "Director or showrunner"),
                ParameterSchema::optional("notes", "string", "Any additional notes or context"),
            ],
            input_schema: None,
            category: Some("movies".into()),
            has_side_effects: true,
        }
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> CoreResult<ToolResult> {
        let title = call.required_str("title")?.trim().to_owned();
        let entry = WatchEntry {
            year: call.int_arg("year"),
            genre: optional_text(call, "genre"),
            director: optional_text(call, "director"),
            notes: optional_text(call, "notes"),
            ..WatchEntry::new(title.clone())
        };

        let outcome = self
            .store
            .append_item(lists::TO_WATCH, entry, |e: &WatchEntry| same_title(&e.title, &title))
            .await?;
        Ok(match outcome {
            Appended::Added => {
                tracing::info!(%title, "added to watchlist");
                ToolResult::success(&call.name, format!("Added '{title}' to your watchlist!"))
            }
            Appended::AlreadyPresent => {
                ToolResult::success(&call.name, format!("'{title}' is already in your watchlist!"))
            }
        })
    }
}

/// `mark_movie_or_show_watched`
pub struct MarkWatchedTool {
    store: Arc<JsonListStore>,
}

impl MarkWatchedTool {
    pub const fn new(store: Arc<JsonListStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for MarkWatchedTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "mark_movie_or_show_watched".into(),
            description: "Mark a watchlist title as watched, moving it to the watch history with today's date."
                .into(),
            parameters: vec![
                ParameterSchema::required(
                    "title",
                    "string",
                    "Title as it appears on the watchlist (case-insensitive)",
                ),
                ParameterSchema::optional("rating", "number", "Rating out of 10"),
                ParameterSchema::optional("notes", "string", "Thoughts about the movie or show"),
            ],
            input_schema: None,
            category: Some("movies".into()),
            has_side_effects: true,
        }
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> CoreResult<ToolResult> {
        let title = call.required_str("title")?.trim().to_owned();
        let rating = rating_arg(call)?;
        let notes = optional_text(call, "notes");

        let moved = self
            .store
            .move_item(
                lists::TO_WATCH,
                lists::WATCHED,
                |e: &WatchEntry| same_title(&e.title, &title),
                |e| {
                    e.watched_date = Some(today());
                    if rating.is_some() {
                        e.rating = rating;
                    }
                    if notes.is_some() {
                        e.notes = notes;
                    }
                },
            )
            .await?;

        Ok(match moved {
            Some(entry) => {
                tracing::info!(title = %entry.title, "marked watched");
                let rated = rating.map(|r| format!("Rated {}/10. ", format_rating(r))).unwrap_or_default();
                ToolResult::success(&call.name, format!("Marked '{}' as watched! {rated}Great job!", entry.title))
            }
            None => ToolResult::failure(
                &call.name,
                format!("'{title}' not found in your watchlist. Make sure the title matches exactly."),
            ),
        })
    }
}

/// `search_omdb_movie_or_show`
pub struct SearchTitlesTool {
    catalog: Arc<dyn TitleCatalog>,
}

impl SearchTitlesTool {
    pub fn new(catalog: Arc<dyn TitleCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for SearchTitlesTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "search_omdb_movie_or_show".into(),
            description: "Look up movie or show metadata (year, type, IMDb id) in OMDB. Use it to enrich a title \
                          being added to the watchlist or to identify a title the user names. Do not use it to \
                          browse for recommendations or to review the user's own lists."
                .into(),
            parameters: vec![
                ParameterSchema::required("title", "string", "Title to search for"),
                ParameterSchema::optional("year", "string", "Release year, if known"),
                ParameterSchema::optional("type", "string", "Restrict to one kind of result")
                    .with_enum(vec![json!("movie"), json!("series"), json!("episode")]),
            ],
            input_schema: None,
            category: Some("movies".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> CoreResult<ToolResult> {
        let query = TitleQuery {
            title: call.required_str("title")?.trim().to_owned(),
            year: call
                .str_arg("year")
                .map(str::to_owned)
                .or_else(|| call.int_arg("year").map(|y| y.to_string())),
            kind: optional_text(call, "type"),
        };

        let matches = self.catalog.search_titles(&query).await?;
        if matches.is_empty() {
            return Ok(ToolResult::failure(
                &call.name,
                format!("Movie '{}' not found.", query.title),
            ));
        }
        let data = serde_json::to_value(&matches)?;
        Ok(ToolResult::success(&call.name, format!("Found matches: {data}")).with_data(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svckit::test_support::{ctx, invoke};
    use crate::sources::TitleMatch;
    use crate::error::Result;

    struct FixedCatalog(Vec<TitleMatch>);

    #[async_trait]
    impl TitleCatalog for FixedCatalog {
        async fn search_titles(&self, _query: &TitleQuery) -> Result<Vec<TitleMatch>> {
            Ok(self.0.clone())
        }
    }

    fn store(dir: &tempfile::TempDir) -> Arc<JsonListStore> {
        Arc::new(JsonListStore::new(dir.path().join("movies_and_shows.json")))
    }

    #[tokio::test]
    async fn list_header_counts_both_lists() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        std::fs::write(
            store.path(),
            r#"{"to_watch": [{"title": "Alien"}], "watched": [{"title": "Heat", "rating": 9}, {"title": "Up"}]}"#,
        )
        .unwrap();

        let result = invoke(&MovieListsTool::new(store), "{}").await;
        assert!(result.success);
        assert!(result.output.starts_with("MOVIE DATA (To Watch: 1, Watched: 2)\n"));
        assert!(result.output.contains("\"Heat\""));
    }

    #[tokio::test]
    async fn mark_watched_records_rating_and_date() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        invoke(&AddToWatchlistTool::new(Arc::clone(&store)), r#"{"title": "Arrival", "year": "2016"}"#).await;

        let result = invoke(
            &MarkWatchedTool::new(Arc::clone(&store)),
            r#"{"title": "arrival", "rating": 8, "notes": "Loved it"}"#,
        )
        .await;
        assert!(result.success, "{}", result.output);
        assert_eq!(result.output, "Marked 'Arrival' as watched! Rated 8/10. Great job!");

        let watched: Vec<WatchEntry> = store.read_list(lists::WATCHED).await.unwrap();
        assert_eq!(watched[0].year, Some(2016));
        assert_eq!(watched[0].rating, Some(8.0));
        assert_eq!(watched[0].watched_date.as_deref(), Some(today().as_str()));
        assert_eq!(watched[0].notes.as_deref(), Some("Loved it"));
    }

    #[tokio::test]
    async fn out_of_range_rating_is_rejected_before_moving() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        invoke(&AddToWatchlistTool::new(Arc::clone(&store)), r#"{"title": "Heat"}"#).await;

        let tool = MarkWatchedTool::new(Arc::clone(&store));
        let call = ToolCall::parse("1", "mark_movie_or_show_watched", r#"{"title": "Heat", "rating": 11}"#).unwrap();
        assert!(tool.execute(&call, &ctx()).await.is_err());
        let to_watch: Vec<WatchEntry> = store.read_list(lists::TO_WATCH).await.unwrap();
        assert_eq!(to_watch.len(), 1);
    }

    #[tokio::test]
    async fn search_reports_matches_and_misses() {
        let hit = SearchTitlesTool::new(Arc::new(FixedCatalog(vec![TitleMatch {
            title: "Dune".into(),
            year: "2021".into(),
            imdb_id: "tt1160419".into(),
            kind: "movie".into(),
        }])));
        let result = invoke(&hit, r#"{"title": "Dune", "year": 2021}"#).await;
        assert!(result.success);
        assert!(result.output.starts_with("Found matches: "));
        assert_eq!(result.data.unwrap()[0]["imdb_id"], "tt1160419");

        let miss = SearchTitlesTool::new(Arc::new(FixedCatalog(vec![])));
        let result = invoke(&miss, r#"{"title": "Nonexistent"}"#).await;
        assert!(!result.success);
        assert!(result.output.contains("not found"));
    }

    #[test]
    fn search_description_discourages_browsing() {
        let tool = SearchTitlesTool::new(Arc::new(FixedCatalog(vec![])));
        assert!(tool.schema().description.contains("Do not use it to browse"));
        assert!(MovieListsTool::new(Arc::new(JsonListStore::new("unused.json")))
            .schema()
            .description
            .contains("enough on its own"));
    }
}

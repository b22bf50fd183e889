//! Book Tools
//!
//! Reading list and reading history in `books.json`, plus OpenLibrary search.

use std::sync::Arc;

use agent_core::{
    Result as CoreResult, Tool, ToolCall, ToolContext, ToolResult,
    tool::{ParameterSchema, ToolSchema},
};
use async_trait::async_trait;
use serde_json::json;

use super::{format_rating, limit_arg, optional_text, rating_arg};
use crate::model::{BookEntry, lists, today};
use crate::sources::BookCatalog;
use crate::store::{Appended, JsonListStore};

/// `get_book_lists`
pub struct BookListsTool {
    store: Arc<JsonListStore>,
}

impl BookListsTool {
    pub const fn new(store: Arc<JsonListStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for BookListsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_book_lists".into(),
            description: "Get the reading list (to_read) and reading history (read, with ratings and notes). \
                          Call this before recommending a book or answering questions about what was read."
                .into(),
            parameters: vec![],
            input_schema: None,
            category: Some("books".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> CoreResult<ToolResult> {
        let mut found = self
            .store
            .read_lists::<BookEntry>(&[lists::TO_READ, lists::READ])
            .await?
            .into_iter();
        let to_read = found.next().unwrap_or_default();
        let read = found.next().unwrap_or_default();

        let mut output = format!("BOOK DATA (To Read: {}, Read: {})\n", to_read.len(), read.len());
        output.push_str(&"=".repeat(50));
        output.push_str("\n\n");
        output.push_str(&serde_json::to_string_pretty(&json!({
            lists::TO_READ: to_read,
            lists::READ: read,
        }))?);

        Ok(ToolResult::success(&call.name, output))
    }
}

/// `add_book_to_reading_list`
pub struct AddToReadingListTool {
    store: Arc<JsonListStore>,
}

impl AddToReadingListTool {
    pub const fn new(store: Arc<JsonListStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for AddToReadingListTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "add_book_to_reading_list".into(),
            description: "Add a book to the reading list. A book already on the list (same title and author) is \
                          not added twice."
                .into(),
            parameters: vec![
                ParameterSchema::required("title", "string", "Book title"),
                ParameterSchema::optional("author", "string", "Author name"),
                ParameterSchema::optional("genre", "string", "Genre"),
                ParameterSchema::optional("pages", "integer", "Page count"),
                ParameterSchema::optional("notes", "string", "Why it is on the list, who recommended it"),
            ],
            input_schema: None,
            category: Some("books".into()),
            has_side_effects: true,
        }
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> CoreResult<ToolResult> {
        let title = call.required_str("title")?.trim().to_owned();
        let author = optional_text(call, "author");
        let entry = BookEntry {
            author: author.clone(),
            genre: optional_text(call, "genre"),
            pages: call.int_arg("pages").and_then(|p| u32::try_from(p).ok()),
            notes: optional_text(call, "notes"),
            ..BookEntry::new(title.clone())
        };

        let outcome = self
            .store
            .append_item(lists::TO_READ, entry, |e: &BookEntry| e.matches(&title, author.as_deref()))
            .await?;
        let by = author.map(|a| format!(" by {a}")).unwrap_or_default();
        Ok(match outcome {
            Appended::Added => {
                tracing::info!(%title, "added to reading list");
                ToolResult::success(&call.name, format!("Added '{title}'{by} to your reading list!"))
            }
            Appended::AlreadyPresent => {
                ToolResult::success(&call.name, format!("'{title}'{by} is already in your reading list!"))
            }
        })
    }
}

/// `mark_book_read`
pub struct MarkBookReadTool {
    store: Arc<JsonListStore>,
}

impl MarkBookReadTool {
    pub const fn new(store: Arc<JsonListStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for MarkBookReadTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "mark_book_read".into(),
            description: "Mark a reading-list book as read, moving it to the reading history with today's date."
                .into(),
            parameters: vec![
                ParameterSchema::required("title", "string", "Title as it appears on the reading list"),
                ParameterSchema::optional("author", "string", "Author, to tell apart books with the same title"),
                ParameterSchema::optional("rating", "number", "Rating out of 10"),
                ParameterSchema::optional("notes", "string", "Thoughts about the book"),
            ],
            input_schema: None,
            category: Some("books".into()),
            has_side_effects: true,
        }
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> CoreResult<ToolResult> {
        let title = call.required_str("title")?.trim().to_owned();
        let author = optional_text(call, "author");
        let rating = rating_arg(call)?;
        let notes = optional_text(call, "notes");

        let moved = self
            .store
            .move_item(
                lists::TO_READ,
                lists::READ,
                |e: &BookEntry| e.matches(&title, author.as_deref()),
                |e| {
                    e.read_date = Some(today());
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
                tracing::info!(title = %entry.title, "marked read");
                let rated = rating.map(|r| format!("Rated {}/10. ", format_rating(r))).unwrap_or_default();
                ToolResult::success(&call.name, format!("Marked '{}' as read! {rated}Nice one!", entry.title))
            }
            None => ToolResult::failure(
                &call.name,
                format!("'{title}' not found in your reading list. Make sure the title matches exactly."),
            ),
        })
    }
}

/// `search_book`
pub struct SearchBookTool {
    catalog: Arc<dyn BookCatalog>,
}

impl SearchBookTool {
    pub fn new(catalog: Arc<dyn BookCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for SearchBookTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "search_book".into(),
            description: "Look up book metadata (authors, first publication year, pages, subjects) in OpenLibrary. \
                          Use it to fill in details for a book being added or to identify a book the user names."
                .into(),
            parameters: vec![
                ParameterSchema::required("title", "string", "Book title"),
                ParameterSchema::optional("author", "string", "Author name, to narrow the search"),
                ParameterSchema::optional("limit", "integer", "Maximum number of matches")
                    .with_default(json!(5)),
            ],
            input_schema: None,
            category: Some("books".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> CoreResult<ToolResult> {
        let title = call.required_str("title")?.trim().to_owned();
        let author = optional_text(call, "author");
        let limit = limit_arg(call, 5, 20);

        let matches = self.catalog.search_books(&title, author.as_deref(), limit).await?;
        if matches.is_empty() {
            return Ok(ToolResult::failure(&call.name, format!("Book '{title}' not found.")));
        }
        let data = serde_json::to_value(&matches)?;
        Ok(ToolResult::success(&call.name, format!("Found matches: {data}")).with_data(data))
    }
}

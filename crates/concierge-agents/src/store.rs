//! Flat JSON list documents
//!
//! A document is a JSON object whose fields are named lists of entries:
//!
//! ```json
//! { "to_watch": [ { "title": "Dune", ... } ], "watched": [] }
//! ```
//!
//! Every read-modify-write holds the store's async mutex and writes go to a
//! temporary file that is renamed over the document, so a reader never sees
//! a half-written file. Other processes editing the same file are not
//! coordinated with.

use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::error::{Result, ToolError};

/// Outcome of [`JsonListStore::append_item`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Appended {
    Added,
    AlreadyPresent,
}

/// One JSON document of named lists
#[derive(Debug)]
pub struct JsonListStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonListStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries of one list; a missing document or list reads as empty
    pub async fn read_list<T: DeserializeOwned>(&self, list: &str) -> Result<Vec<T>> {
        let _guard = self.lock.lock().await;
        let doc = self.load().await?;
        self.decode_list(&doc, list)
    }

    /// Several lists read under one lock, so they are mutually consistent
    pub async fn read_lists<T: DeserializeOwned>(&self, lists: &[&str]) -> Result<Vec<Vec<T>>> {
        let _guard = self.lock.lock().await;
        let doc = self.load().await?;
        lists.iter().map(|list| self.decode_list(&doc, list)).collect()
    }

    /// Append `item` unless an entry already satisfies `is_duplicate`
    pub async fn append_item<T, F>(&self, list: &str, item: T, is_duplicate: F) -> Result<Appended>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(&T) -> bool,
    {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        let mut entries: Vec<T> = self.decode_list(&doc, list)?;
        if entries.iter().any(|e| is_duplicate(e)) {
            return Ok(Appended::AlreadyPresent);
        }

        entries.push(item);
        doc.insert(list.to_owned(), serde_json::to_value(entries)?);
        self.persist(&doc).await?;
        tracing::debug!(path = %self.path.display(), list, "appended list entry");
        Ok(Appended::Added)
    }

    /// Move the first entry matching `select` from `src` to the end of `dst`,
    /// applying `update` on the way. Returns the moved entry, or `None` with
    /// both lists untouched when nothing matches.
    pub async fn move_item<T, F, U>(&self, src: &str, dst: &str, select: F, update: U) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned + Clone,
        F: Fn(&T) -> bool,
        U: FnOnce(&mut T),
    {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        let mut from: Vec<T> = self.decode_list(&doc, src)?;
        let Some(index) = from.iter().position(|e| select(e)) else {
            return Ok(None);
        };

        let mut item = from.remove(index);
        update(&mut item);
        let mut to: Vec<T> = self.decode_list(&doc, dst)?;
        to.push(item.clone());

        doc.insert(src.to_owned(), serde_json::to_value(from)?);
        doc.insert(dst.to_owned(), serde_json::to_value(to)?);
        self.persist(&doc).await?;
        tracing::debug!(path = %self.path.display(), src, dst, "moved list entry");
        Ok(Some(item))
    }

    async fn load(&self) -> Result<Map<String, Value>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(ToolError::storage(&self.path, e)),
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str(&raw) {
            Ok(Value::Object(doc)) => Ok(doc),
            Ok(_) => Err(ToolError::storage(&self.path, "document is not a JSON object")),
            Err(e) => Err(ToolError::storage(&self.path, e)),
        }
    }

    fn decode_list<T: DeserializeOwned>(&self, doc: &Map<String, Value>, list: &str) -> Result<Vec<T>> {
        match doc.get(list) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| ToolError::storage(&self.path, format!("list '{list}': {e}"))),
        }
    }

    async fn persist(&self, doc: &Map<String, Value>) -> Result<()> {
        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(dir) = dir {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| ToolError::storage(dir, e))?;
        }

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = self
            .path
            .with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4().simple()));

        let body = serde_json::to_string_pretty(doc)?;
        if let Err(e) = tokio::fs::write(&tmp, body).await {
            return Err(ToolError::storage(&tmp, e));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(ToolError::storage(&self.path, e));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{WatchEntry, same_title};
    use std::sync::Arc;

    fn store(dir: &tempfile::TempDir) -> JsonListStore {
        JsonListStore::new(dir.path().join("lists.json"))
    }

    #[tokio::test]
    async fn missing_document_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let entries: Vec<WatchEntry> = store(&dir).read_list("to_watch").await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn append_rejects_duplicates_and_creates_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonListStore::new(dir.path().join("nested/lists.json"));
        let added = store
            .append_item("to_watch", WatchEntry::new("Dune"), |e: &WatchEntry| same_title(&e.title, "Dune"))
            .await
            .unwrap();
        assert_eq!(added, Appended::Added);
        let again = store
            .append_item("to_watch", WatchEntry::new("DUNE"), |e: &WatchEntry| same_title(&e.title, "DUNE"))
            .await
            .unwrap();
        assert_eq!(again, Appended::AlreadyPresent);

        let entries: Vec<WatchEntry> = store.read_list("to_watch").await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn move_without_a_match_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        std::fs::write(store.path(), r#"{"to_watch": [{"title": "Alien"}], "watched": []}"#).unwrap();
        let before = std::fs::read_to_string(store.path()).unwrap();

        let moved = store
            .move_item("to_watch", "watched", |e: &WatchEntry| same_title(&e.title, "Dune"), |_| {})
            .await
            .unwrap();
        assert!(moved.is_none());
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
    }

    #[tokio::test]
    async fn move_preserves_other_lists_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        std::fs::write(
            store.path(),
            r#"{"to_watch": [{"title": "A"}, {"title": "B"}], "watched": [{"title": "Z"}], "owner": "me"}"#,
        )
        .unwrap();

        let moved = store
            .move_item("to_watch", "watched", |e: &WatchEntry| e.title == "A", |e| e.rating = Some(8.0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(moved.rating, Some(8.0));

        let lists: Vec<Vec<WatchEntry>> = store.read_lists(&["to_watch", "watched"]).await.unwrap();
        assert_eq!(lists[0].iter().map(|e| e.title.as_str()).collect::<Vec<_>>(), ["B"]);
        assert_eq!(lists[1].iter().map(|e| e.title.as_str()).collect::<Vec<_>>(), ["Z", "A"]);

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["owner"], "me");
    }

    #[tokio::test]
    async fn concurrent_appends_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store(&dir));
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let title = format!("Film {i}");
                store
                    .append_item("to_watch", WatchEntry::new(title.clone()), move |e: &WatchEntry| e.title == title)
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let entries: Vec<WatchEntry> = store.read_list("to_watch").await.unwrap();
        assert_eq!(entries.len(), 16);
    }

    #[tokio::test]
    async fn corrupt_document_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        std::fs::write(store.path(), "[1, 2").unwrap();
        let err = store.read_list::<WatchEntry>("to_watch").await.unwrap_err();
        assert!(matches!(err, ToolError::Storage { .. }));
    }
}

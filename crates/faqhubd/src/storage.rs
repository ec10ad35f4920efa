//! FAQ storage on two JSON files.
//!
//! `all.json` holds the list of summaries shown on the index page,
//! `faq.json` maps id -> full entry. Every read and write goes through one
//! async mutex, so concurrent requests never interleave a read-modify-write.
//! Missing or unparsable files read as empty.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::warn;

pub const INDEX_FILE: &str = "all.json";
pub const ENTRIES_FILE: &str = "faq.json";

/// Language code -> text
pub type Localized = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FaqEntry {
    pub id: String,
    #[serde(default)]
    pub titles: Localized,
    #[serde(default)]
    pub contents: Localized,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FaqSummary {
    pub id: String,
    #[serde(default)]
    pub titles: Localized,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl From<&FaqEntry> for FaqSummary {
    fn from(entry: &FaqEntry) -> Self {
        Self {
            id: entry.id.clone(),
            titles: entry.titles.clone(),
            tags: entry.tags.clone(),
        }
    }
}

pub struct JsonStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl JsonStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub async fn list(&self) -> Vec<FaqSummary> {
        let _guard = self.lock.lock().await;
        load_or_default(&self.dir.join(INDEX_FILE)).await
    }

    pub async fn get(&self, id: &str) -> Option<FaqEntry> {
        let _guard = self.lock.lock().await;
        let mut entries: BTreeMap<String, FaqEntry> =
            load_or_default(&self.dir.join(ENTRIES_FILE)).await;
        entries.remove(id)
    }

    /// Insert or replace an entry and its summary
    pub async fn upsert(&self, entry: FaqEntry) -> io::Result<()> {
        let _guard = self.lock.lock().await;
        let (mut index, mut entries) = self.load_both().await;

        let summary = FaqSummary::from(&entry);
        match index.iter_mut().find(|item| item.id == entry.id) {
            Some(existing) => {
                existing.titles = summary.titles;
                existing.tags = summary.tags;
            }
            None => index.push(summary),
        }
        entries.insert(entry.id.clone(), entry);

        self.save_both(&index, &entries).await
    }

    /// Remove an entry; removing an unknown id is not an error
    pub async fn delete(&self, id: &str) -> io::Result<()> {
        let _guard = self.lock.lock().await;
        let (mut index, mut entries) = self.load_both().await;

        index.retain(|item| item.id != id);
        entries.remove(id);

        self.save_both(&index, &entries).await
    }

    async fn load_both(&self) -> (Vec<FaqSummary>, BTreeMap<String, FaqEntry>) {
        (
            load_or_default(&self.dir.join(INDEX_FILE)).await,
            load_or_default(&self.dir.join(ENTRIES_FILE)).await,
        )
    }

    async fn save_both(
        &self,
        index: &[FaqSummary],
        entries: &BTreeMap<String, FaqEntry>,
    ) -> io::Result<()> {
        save(&self.dir.join(INDEX_FILE), index).await?;
        save(&self.dir.join(ENTRIES_FILE), entries).await
    }
}

async fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Cannot read {}: {}", path.display(), e);
            }
            return T::default();
        }
    };

    serde_json::from_str(&content).unwrap_or_else(|e| {
        warn!("Ignoring malformed {}: {}", path.display(), e);
        T::default()
    })
}

async fn save<T: Serialize + ?Sized>(path: &Path, data: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    tokio::fs::write(path, json).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn entry(id: &str, title: &str) -> FaqEntry {
        FaqEntry {
            id: id.to_string(),
            titles: [("ru".to_string(), title.to_string())].into(),
            contents: [("ru".to_string(), "текст".to_string())].into(),
            tags: vec!["billing".to_string()],
        }
    }

    #[tokio::test]
    async fn test_missing_files_read_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::new(dir.path());
        assert!(store.list().await.is_empty());
        assert!(store.get("nope").await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_files_read_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(INDEX_FILE), "{{{").unwrap();
        let store = JsonStore::new(dir.path());
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_updates_summary_in_place() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::new(dir.path());

        store.upsert(entry("a", "first")).await.unwrap();
        store.upsert(entry("b", "second")).await.unwrap();
        store.upsert(entry("a", "renamed")).await.unwrap();

        let list = store.list().await;
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, "a");
        assert_eq!(list[0].titles["ru"], "renamed");
        assert_eq!(store.get("a").await.unwrap().titles["ru"], "renamed");

        // non-ASCII stays readable on disk
        let raw = std::fs::read_to_string(dir.path().join(ENTRIES_FILE)).unwrap();
        assert!(raw.contains("текст"));
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::new(dir.path());
        store.upsert(entry("a", "first")).await.unwrap();

        store.delete("a").await.unwrap();
        store.delete("never-existed").await.unwrap();

        assert!(store.list().await.is_empty());
        assert!(store.get("a").await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_upserts_are_not_lost() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(JsonStore::new(dir.path()));

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.upsert(entry(&format!("q{}", i), "t")).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(store.list().await.len(), 16);
    }
}

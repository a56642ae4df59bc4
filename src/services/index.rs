use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::domain::page::PageRecord;
use crate::error::{AppError, Result};
use crate::services::placement::file_name_from_url;

/// Page list persisted to a primary file plus mirrors, re-read on every mutation.
pub struct PageIndex {
    primary: PathBuf,
    mirrors: Vec<PathBuf>,
    write_lock: Mutex<()>,
}

impl PageIndex {
    pub fn new(primary: PathBuf, mirrors: Vec<PathBuf>) -> Self {
        Self { primary, mirrors, write_lock: Mutex::new(()) }
    }

    pub fn destinations(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.primary.as_path()).chain(self.mirrors.iter().map(PathBuf::as_path))
    }

    /// Missing, unreadable or non-array content loads as empty.
    pub async fn load(&self) -> Vec<PageRecord> {
        let raw = match tokio::fs::read_to_string(&self.primary).await {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };
        let Ok(Value::Array(items)) = serde_json::from_str::<Value>(&raw) else {
            warn!(path = %self.primary.display(), "page index is not a JSON array; starting empty");
            return Vec::new();
        };
        let total = items.len();
        let pages: Vec<PageRecord> = items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect();
        if pages.len() != total {
            warn!(dropped = total - pages.len(), "skipped malformed page index entries");
        }
        pages
    }

    pub async fn upsert(&self, record: PageRecord) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let mut pages = self.load().await;
        match pages.iter_mut().find(|p| p.url == record.url) {
            Some(existing) => existing.merge(record),
            None => pages.push(with_default_title(record)),
        }
        sort_newest_first(&mut pages);
        self.persist(&pages).await?;
        Ok(pages.len())
    }

    pub async fn delete(&self, url: &str) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let mut pages = self.load().await;
        let before = pages.len();
        pages.retain(|p| p.url != url);
        sort_newest_first(&mut pages);
        self.persist(&pages).await?;
        info!(%url, removed = before - pages.len(), remaining = pages.len(), "deleted from page index");
        Ok(pages.len())
    }

    async fn persist(&self, pages: &[PageRecord]) -> Result<()> {
        let body = serde_json::to_string_pretty(pages)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("serialize page index: {e}")))?;
        for path in self.destinations() {
            write_file(path, &body)
                .await
                .map_err(|source| AppError::IndexPersist { path: path.to_path_buf(), source })?;
        }
        info!(records = pages.len(), destinations = self.mirrors.len() + 1, "wrote page index");
        Ok(())
    }
}

async fn write_file(path: &Path, body: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, body).await
}

/// New records without a title are named after their page file.
fn with_default_title(mut record: PageRecord) -> PageRecord {
    if record.title.is_empty() {
        record.title = file_name_from_url(&record.url).unwrap_or_else(|| record.url.clone());
    }
    record
}

/// Stable sort, newest `created_at` first.
pub fn sort_newest_first(pages: &mut [PageRecord]) {
    pages.sort_by_key(|p| std::cmp::Reverse(p.created_at_key()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(url: &str, created_at: &str) -> PageRecord {
        PageRecord {
            url: url.into(),
            title: url.into(),
            created_at: created_at.into(),
            ..Default::default()
        }
    }

    fn index_in(tmp: &TempDir) -> PageIndex {
        PageIndex::new(
            tmp.path().join("data/pages.json"),
            vec![tmp.path().join("public/data/pages.json")],
        )
    }

    fn assert_sorted(pages: &[PageRecord]) {
        for pair in pages.windows(2) {
            assert!(pair[0].created_at_key() >= pair[1].created_at_key(), "{pages:?}");
        }
    }

    #[tokio::test]
    async fn missing_or_garbage_index_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let index = index_in(&tmp);
        assert!(index.load().await.is_empty());

        std::fs::create_dir_all(tmp.path().join("data")).unwrap();
        std::fs::write(tmp.path().join("data/pages.json"), "{\"not\": \"a list\"}").unwrap();
        assert!(index.load().await.is_empty());

        std::fs::write(tmp.path().join("data/pages.json"), "[oops").unwrap();
        assert!(index.load().await.is_empty());
    }

    #[tokio::test]
    async fn upsert_twice_keeps_one_entry_with_latest_fields() {
        let tmp = TempDir::new().unwrap();
        let index = index_in(&tmp);
        let mut first = record("https://x/a.html", "2024-01-01T00:00:00.000Z");
        first.description = "first".into();
        assert_eq!(index.upsert(first.clone()).await.unwrap(), 1);

        let mut second = first.clone();
        second.title = "Renamed".into();
        second.description = String::new();
        assert_eq!(index.upsert(second).await.unwrap(), 1);

        let pages = index.load().await;
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].title, "Renamed");
        assert_eq!(pages[0].description, "first");
    }

    #[tokio::test]
    async fn index_stays_sorted_newest_first() {
        let tmp = TempDir::new().unwrap();
        let index = index_in(&tmp);
        index.upsert(record("b", "2024-02-01T00:00:00.000Z")).await.unwrap();
        index.upsert(record("bad", "not a date")).await.unwrap();
        index.upsert(record("c", "2024-03-01T00:00:00.000Z")).await.unwrap();
        index.upsert(record("a", "2024-01-01T00:00:00.000Z")).await.unwrap();

        let pages = index.load().await;
        let urls: Vec<&str> = pages.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, ["c", "b", "a", "bad"]);
        assert_sorted(&pages);

        index.delete("b").await.unwrap();
        assert_sorted(&index.load().await);
    }

    #[tokio::test]
    async fn delete_removes_every_match_and_mirrors_agree() {
        let tmp = TempDir::new().unwrap();
        let index = index_in(&tmp);
        let dupes = serde_json::to_string(&vec![
            record("dup", "2024-01-01T00:00:00.000Z"),
            record("keep", "2024-01-02T00:00:00.000Z"),
            record("dup", "2024-01-03T00:00:00.000Z"),
        ])
        .unwrap();
        std::fs::create_dir_all(tmp.path().join("data")).unwrap();
        std::fs::write(tmp.path().join("data/pages.json"), dupes).unwrap();

        assert_eq!(index.delete("dup").await.unwrap(), 1);

        let primary = std::fs::read(tmp.path().join("data/pages.json")).unwrap();
        let mirror = std::fs::read(tmp.path().join("public/data/pages.json")).unwrap();
        assert_eq!(primary, mirror);
        let pages = index.load().await;
        assert!(pages.iter().all(|p| p.url != "dup"));
    }

    #[tokio::test]
    async fn delete_of_unknown_url_still_persists() {
        let tmp = TempDir::new().unwrap();
        let index = index_in(&tmp);
        assert_eq!(index.delete("nothing").await.unwrap(), 0);
        let written = std::fs::read_to_string(tmp.path().join("public/data/pages.json")).unwrap();
        assert_eq!(written, "[]");
    }

    #[tokio::test]
    async fn failed_mirror_write_fails_the_operation() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("blocker"), "file, not a dir").unwrap();
        let index = PageIndex::new(
            tmp.path().join("pages.json"),
            vec![tmp.path().join("ok/pages.json"), tmp.path().join("blocker/pages.json")],
        );

        let err = index.upsert(record("a", "2024-01-01T00:00:00.000Z")).await.unwrap_err();
        match err {
            AppError::IndexPersist { path, .. } => assert_eq!(path, tmp.path().join("blocker/pages.json")),
            other => panic!("unexpected error: {other:?}"),
        }
        // The primary and first mirror were written before the failure.
        assert_eq!(index.load().await.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_upserts_do_not_lose_records() {
        let tmp = TempDir::new().unwrap();
        let index = std::sync::Arc::new(index_in(&tmp));
        let mut tasks = Vec::new();
        for i in 0..16 {
            let index = index.clone();
            tasks.push(tokio::spawn(async move {
                index.upsert(record(&format!("u{i}"), "2024-01-01T00:00:00.000Z")).await
            }));
        }
        for t in tasks {
            t.await.unwrap().unwrap();
        }
        assert_eq!(index.load().await.len(), 16);
    }

    #[tokio::test]
    async fn blank_title_defaults_only_for_new_records() {
        let tmp = TempDir::new().unwrap();
        let index = index_in(&tmp);
        let mut page = record("https://x/pages/p.html", "2024-01-01T00:00:00.000Z");
        page.title = String::new();
        index.upsert(page.clone()).await.unwrap();
        assert_eq!(index.load().await[0].title, "p.html");

        let mut titled = page.clone();
        titled.title = "Nice Title".into();
        index.upsert(titled).await.unwrap();
        index.upsert(page).await.unwrap();
        assert_eq!(index.load().await[0].title, "Nice Title");
    }

    #[tokio::test]
    async fn entries_with_null_or_odd_fields_survive_other_upserts() {
        let tmp = TempDir::new().unwrap();
        let index = index_in(&tmp);
        std::fs::create_dir_all(tmp.path().join("data")).unwrap();
        std::fs::write(
            tmp.path().join("data/pages.json"),
            r#"[{"url":"https://e.org/old.html","title":"Old","description":null,"image":null,"created_at":1700000000000}]"#,
        )
        .unwrap();
        index.upsert(record("https://e.org/new.html", "2024-01-01T00:00:00.000Z")).await.unwrap();

        let pages = index.load().await;
        assert_eq!(pages.len(), 2);
        let old = pages.iter().find(|p| p.url == "https://e.org/old.html").unwrap();
        assert_eq!(old.title, "Old");
        assert_eq!(old.image, "");
        assert_eq!(old.created_at, "1700000000000");
    }

    #[tokio::test]
    async fn unknown_fields_pass_through_upsert() {
        let tmp = TempDir::new().unwrap();
        let index = index_in(&tmp);
        std::fs::create_dir_all(tmp.path().join("data")).unwrap();
        std::fs::write(
            tmp.path().join("data/pages.json"),
            r#"[{"url":"a","title":"A","tags":["x"]}, 42]"#,
        )
        .unwrap();
        index.upsert(record("a", "2024-01-01T00:00:00.000Z")).await.unwrap();
        let pages = index.load().await;
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].extra["tags"], serde_json::json!(["x"]));
    }
}

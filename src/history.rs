//! Durable record of previously accepted articles.
//!
//! The store is a JSON-lines file, one [`SeenRecord`] per line, loaded
//! whole at startup and appended to as articles are accepted. A missing
//! file is a first run and a corrupt line is skipped with a warning; the
//! store never fails the pipeline. History is bounded by age-based
//! pruning, which keeps the linear similarity scan in
//! [`HistoryStore::find_similar_title`] acceptable.

use crate::models::SeenRecord;
use crate::utils::normalize_title;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use strsim::normalized_levenshtein;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

/// In-memory view of the persisted history, plus its backing file.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    records: Vec<SeenRecord>,
    urls: HashSet<String>,
    hashes: HashSet<String>,
}

impl HistoryStore {
    /// Load the store from `path`.
    ///
    /// A missing or unreadable file degrades to an empty history with a
    /// warning; dedup against history is effectively disabled for the run
    /// but the run proceeds. Corrupt lines are skipped individually.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut store = Self {
            path,
            records: Vec::new(),
            urls: HashSet::new(),
            hashes: HashSet::new(),
        };

        let raw = match fs::read_to_string(&store.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No history file yet; starting with empty history");
                return store;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read history file; continuing with empty history");
                return store;
            }
        };

        let mut corrupt = 0usize;
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<SeenRecord>(line) {
                Ok(record) => store.index(record),
                Err(e) => {
                    corrupt += 1;
                    debug!(error = %e, "Skipping corrupt history line");
                }
            }
        }
        if corrupt > 0 {
            warn!(corrupt, "History file contained corrupt lines; skipped");
        }
        info!(count = store.records.len(), "Loaded history");
        store
    }

    fn index(&mut self, record: SeenRecord) {
        if self.urls.contains(&record.url) {
            return;
        }
        self.urls.insert(record.url.clone());
        if let Some(hash) = &record.content_hash {
            self.hashes.insert(hash.clone());
        }
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Exact URL membership.
    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    /// Exact content-hash membership.
    pub fn content_hash_exists(&self, hash: &str) -> bool {
        self.hashes.contains(hash)
    }

    /// Whether any historical title is at least `threshold` similar to
    /// `title` under normalized Levenshtein ratio.
    ///
    /// Linear scan over the loaded history; bounded by retention pruning.
    pub fn find_similar_title(&self, title: &str, threshold: f64) -> bool {
        let normalized = normalize_title(title);
        self.records
            .iter()
            .any(|r| normalized_levenshtein(&normalized, &r.title_normalized) >= threshold)
    }

    /// Append a record to the store and its backing file.
    ///
    /// Idempotent: a record whose URL is already present is a no-op, never
    /// a duplicate row.
    #[instrument(level = "debug", skip_all, fields(url = %record.url))]
    pub async fn append(&mut self, record: SeenRecord) -> io::Result<()> {
        if self.urls.contains(&record.url) {
            debug!("URL already recorded; skipping append");
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let line = serde_json::to_string(&record).map_err(io::Error::other)?;
        let mut file = fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;

        self.index(record);
        Ok(())
    }

    /// Drop records older than `max_age_days` and rewrite the backing file.
    ///
    /// Records with unparseable timestamps are kept. Returns the number of
    /// records removed.
    #[instrument(level = "info", skip_all, fields(max_age_days))]
    pub async fn prune(&mut self, max_age_days: i64) -> io::Result<usize> {
        let cutoff = Utc::now() - Duration::days(max_age_days);
        let before = self.records.len();

        self.records.retain(|r| match parse_saved_at(&r.saved_at) {
            Some(saved_at) => saved_at > cutoff,
            None => true,
        });

        let removed = before - self.records.len();
        if removed == 0 {
            return Ok(0);
        }

        self.urls = self.records.iter().map(|r| r.url.clone()).collect();
        self.hashes = self
            .records
            .iter()
            .filter_map(|r| r.content_hash.clone())
            .collect();

        let mut out = String::new();
        for record in &self.records {
            out.push_str(&serde_json::to_string(record).map_err(io::Error::other)?);
            out.push('\n');
        }
        fs::write(&self.path, out).await?;

        info!(removed, remaining = self.records.len(), "Pruned history");
        Ok(removed)
    }
}

fn parse_saved_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    static SCRATCH: AtomicU32 = AtomicU32::new(0);

    fn scratch_path(tag: &str) -> PathBuf {
        let n = SCRATCH.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!(
            "sourcing_news_history_{}_{}_{}.jsonl",
            tag,
            std::process::id(),
            n
        ))
    }

    fn record(url: &str, title: &str, saved_at: &str) -> SeenRecord {
        SeenRecord {
            url: url.to_string(),
            title_normalized: normalize_title(title),
            content_hash: None,
            saved_at: saved_at.to_string(),
        }
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let store = HistoryStore::load(scratch_path("missing")).await;
        assert!(store.is_empty());
        assert!(!store.contains("https://example.com/x"));
    }

    #[tokio::test]
    async fn test_append_then_reload_detects_url() {
        let path = scratch_path("roundtrip");
        let mut store = HistoryStore::load(&path).await;
        store
            .append(record(
                "https://example.com/cra",
                "EU passes new Cyber Resilience Act",
                &Utc::now().to_rfc3339(),
            ))
            .await
            .unwrap();

        // Fresh load, as the next run would do.
        let next_run = HistoryStore::load(&path).await;
        assert_eq!(next_run.len(), 1);
        assert!(next_run.contains("https://example.com/cra"));
        assert!(next_run.find_similar_title("EU passes new Cyber Resilience Act", 0.85));

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_append_is_idempotent_per_url() {
        let path = scratch_path("idempotent");
        let mut store = HistoryStore::load(&path).await;
        let now = Utc::now().to_rfc3339();
        store
            .append(record("https://example.com/a", "Chip fab breaks ground", &now))
            .await
            .unwrap();
        store
            .append(record("https://example.com/a", "Chip fab breaks ground", &now))
            .await
            .unwrap();
        assert_eq!(store.len(), 1);

        let reloaded = HistoryStore::load(&path).await;
        assert_eq!(reloaded.len(), 1);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_corrupt_lines_skipped() {
        let path = scratch_path("corrupt");
        let good = serde_json::to_string(&record(
            "https://example.com/ok",
            "Battery plant online",
            &Utc::now().to_rfc3339(),
        ))
        .unwrap();
        std::fs::write(&path, format!("{}\nnot json at all\n{{\"half\":", good)).unwrap();

        let store = HistoryStore::load(&path).await;
        assert_eq!(store.len(), 1);
        assert!(store.contains("https://example.com/ok"));

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_prune_drops_old_records() {
        let path = scratch_path("prune");
        let mut store = HistoryStore::load(&path).await;
        let old = (Utc::now() - Duration::days(90)).to_rfc3339();
        let fresh = Utc::now().to_rfc3339();
        store
            .append(record("https://example.com/old", "Old story", &old))
            .await
            .unwrap();
        store
            .append(record("https://example.com/new", "New story", &fresh))
            .await
            .unwrap();

        let removed = store.prune(30).await.unwrap();
        assert_eq!(removed, 1);
        assert!(!store.contains("https://example.com/old"));
        assert!(store.contains("https://example.com/new"));

        // The rewrite must stick across a reload.
        let reloaded = HistoryStore::load(&path).await;
        assert_eq!(reloaded.len(), 1);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_content_hash_index() {
        let path = scratch_path("hash");
        let mut store = HistoryStore::load(&path).await;
        let mut rec = record(
            "https://example.com/h",
            "Hashed story",
            &Utc::now().to_rfc3339(),
        );
        rec.content_hash = Some("abc123".to_string());
        store.append(rec).await.unwrap();

        assert!(store.content_hash_exists("abc123"));
        assert!(!store.content_hash_exists("def456"));

        let _ = std::fs::remove_file(&path);
    }
}

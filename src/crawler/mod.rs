//! Concurrent fan-out crawling across configured sources.
//!
//! One task per source, bounded to `max_concurrency` in flight. Each task
//! runs fetch -> extract -> normalize -> shared-set URL check and is
//! isolated from its siblings: a source that times out, 404s, or returns
//! garbage contributes an empty result and a diagnostic, never an error.
//! Results are merged only after every task finishes or hits the crawl
//! deadline, and the merge is sorted so everything downstream is
//! independent of task completion order.

pub mod extract;
pub mod feed;
pub mod fetch;

use crate::config::{KeywordGate, SourceConfig, SourceKind};
use crate::history::HistoryStore;
use crate::models::Candidate;
use fetch::Fetch;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{Instant, timeout_at};
use tracing::{info, instrument, warn};

/// Crawl-wide knobs.
#[derive(Debug, Clone, Copy)]
pub struct CrawlOptions {
    /// Sources crawled simultaneously.
    pub max_concurrency: usize,
    /// Overall deadline for the whole crawl; independent of (and longer
    /// than) the per-fetch timeout.
    pub deadline: Duration,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            deadline: Duration::from_secs(120),
        }
    }
}

/// Shared state handed to every crawl task.
///
/// The seen-URL set is the only mutable state shared between concurrent
/// tasks; every access goes through its mutex. The history snapshot is
/// read-only for the whole crawl.
pub struct CrawlContext {
    pub seen_urls: Arc<Mutex<HashSet<String>>>,
    pub history: Arc<HistoryStore>,
}

impl CrawlContext {
    pub fn new(history: Arc<HistoryStore>) -> Self {
        Self {
            seen_urls: Arc::new(Mutex::new(HashSet::new())),
            history,
        }
    }
}

/// Crawl every source concurrently and merge the results.
///
/// The merged pool is sorted by `(source, url)`, making the output a
/// deterministic function of the fetched documents rather than of task
/// completion order.
#[instrument(level = "info", skip_all, fields(sources = sources.len()))]
pub async fn crawl_all<F: Fetch>(
    fetcher: &F,
    sources: &[SourceConfig],
    gate: &KeywordGate,
    ctx: &CrawlContext,
    opts: CrawlOptions,
) -> Vec<Candidate> {
    let deadline = Instant::now() + opts.deadline;

    let per_source: Vec<Vec<Candidate>> = stream::iter(sources)
        .map(|source| async move {
            match timeout_at(deadline, crawl_source(fetcher, source, gate, ctx)).await {
                Ok(candidates) => candidates,
                Err(_) => {
                    warn!(source = %source.name, "Crawl deadline reached; dropping source");
                    Vec::new()
                }
            }
        })
        .buffer_unordered(opts.max_concurrency.max(1))
        .collect()
        .await;

    let mut merged: Vec<Candidate> = per_source.into_iter().flatten().collect();
    merged.sort_by(|a, b| a.source.cmp(&b.source).then_with(|| a.url.cmp(&b.url)));

    info!(count = merged.len(), "Crawl complete; merged candidate pool");
    merged
}

/// Crawl a single source: fetch, extract, and filter against the shared
/// seen-URL set and the history snapshot.
///
/// Never returns an error; every failure mode is a logged diagnostic plus
/// an empty contribution.
#[instrument(level = "info", skip_all, fields(source = %source.name))]
async fn crawl_source<F: Fetch>(
    fetcher: &F,
    source: &SourceConfig,
    gate: &KeywordGate,
    ctx: &CrawlContext,
) -> Vec<Candidate> {
    let document = match fetcher.fetch(&source.listing_url).await {
        Ok(document) => document,
        Err(e) => {
            warn!(source = %source.name, error = %e, "Listing fetch failed; source contributes nothing");
            return Vec::new();
        }
    };

    let mut candidates = match source.kind {
        SourceKind::Listing => extract::extract_candidates(&document, source, gate),
        SourceKind::Feed => feed::extract_feed_candidates(&document, source, gate),
    };

    // First barrier: exact-URL dedup against every concurrent task and
    // the loaded history. Fuzzy checks run later, over the merged pool.
    candidates.retain(|candidate| {
        if ctx.history.contains(&candidate.url) {
            return false;
        }
        let mut seen = ctx.seen_urls.lock().expect("seen-url set poisoned");
        seen.insert(candidate.url.clone())
    });

    if source.fetch_body {
        for candidate in &mut candidates {
            candidate.body = fetch::fetch_article_body(fetcher, &candidate.url).await;
        }
    }

    info!(source = %source.name, count = candidates.len(), "Source crawled");
    candidates
}

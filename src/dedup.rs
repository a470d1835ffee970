//! Two-tier deduplication across the current run and persisted history.
//!
//! The decision order short-circuits on the first hit: exact URL within
//! the run, exact URL in history, fuzzy title similarity (history at the
//! loose cross-run threshold, then this run at the strict in-run
//! threshold), and finally exact content-hash equality when a body was
//! fetched. The two thresholds are deliberately distinct policies: the
//! cross-run check aggressively suppresses the same story resurfacing
//! across days and outlets, the in-run check only folds near-identical
//! headlines from the same crawl.

use crate::history::HistoryStore;
use crate::models::Candidate;
use crate::utils::normalize_title;
use sha2::{Digest as _, Sha256};
use std::collections::HashSet;
use std::fmt;
use strsim::normalized_levenshtein;
use tracing::debug;

/// Similarity thresholds, tunable per call site.
#[derive(Debug, Clone, Copy)]
pub struct DedupConfig {
    /// Applied against historical titles. Loose: favors recall, at the
    /// cost of occasionally merging distinct articles sharing a common
    /// subject phrase.
    pub cross_run_title_threshold: f64,
    /// Applied against titles accepted earlier in this run. Strict:
    /// favors precision.
    pub in_run_title_threshold: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            cross_run_title_threshold: 0.5,
            in_run_title_threshold: 0.85,
        }
    }
}

/// Why a candidate was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    UrlSeenThisRun,
    UrlInHistory,
    SimilarTitleInHistory,
    SimilarTitleThisRun,
    ContentInHistory,
    ContentThisRun,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UrlSeenThisRun => "url already seen this run",
            Self::UrlInHistory => "url in history",
            Self::SimilarTitleInHistory => "similar title in history",
            Self::SimilarTitleThisRun => "similar title this run",
            Self::ContentInHistory => "content hash in history",
            Self::ContentThisRun => "content hash this run",
        };
        f.write_str(s)
    }
}

/// Run-scoped duplicate detector over an immutable history snapshot.
pub struct DedupEngine<'a> {
    history: &'a HistoryStore,
    config: DedupConfig,
    run_urls: HashSet<String>,
    run_titles: Vec<String>,
    run_hashes: HashSet<String>,
}

impl<'a> DedupEngine<'a> {
    pub fn new(history: &'a HistoryStore, config: DedupConfig) -> Self {
        Self {
            history,
            config,
            run_urls: HashSet::new(),
            run_titles: Vec::new(),
            run_hashes: HashSet::new(),
        }
    }

    /// Check a candidate against everything seen so far.
    ///
    /// Returns the first matching rejection reason, or `None` when the
    /// candidate is novel. Does not record the candidate; call
    /// [`DedupEngine::record`] once it is accepted.
    pub fn is_duplicate(&self, candidate: &Candidate) -> Option<DropReason> {
        if self.run_urls.contains(&candidate.url) {
            return Some(DropReason::UrlSeenThisRun);
        }
        if self.history.contains(&candidate.url) {
            return Some(DropReason::UrlInHistory);
        }

        let normalized = normalize_title(&candidate.title);
        if self
            .history
            .find_similar_title(&normalized, self.config.cross_run_title_threshold)
        {
            return Some(DropReason::SimilarTitleInHistory);
        }
        if self.run_titles.iter().any(|t| {
            normalized_levenshtein(&normalized, t) >= self.config.in_run_title_threshold
        }) {
            return Some(DropReason::SimilarTitleThisRun);
        }

        if let Some(hash) = content_hash(&candidate.title, candidate.body.as_deref()) {
            if self.history.content_hash_exists(&hash) {
                return Some(DropReason::ContentInHistory);
            }
            if self.run_hashes.contains(&hash) {
                return Some(DropReason::ContentThisRun);
            }
        }

        None
    }

    /// Register an accepted candidate so later candidates dedup against it.
    pub fn record(&mut self, candidate: &Candidate) {
        self.run_urls.insert(candidate.url.clone());
        self.run_titles.push(normalize_title(&candidate.title));
        if let Some(hash) = content_hash(&candidate.title, candidate.body.as_deref()) {
            self.run_hashes.insert(hash);
        }
    }

    /// Filter a merged candidate pool down to novel articles, preserving
    /// input order.
    pub fn filter_pool(&mut self, pool: Vec<Candidate>) -> Vec<Candidate> {
        let mut accepted = Vec::with_capacity(pool.len());
        for candidate in pool {
            match self.is_duplicate(&candidate) {
                Some(reason) => {
                    debug!(url = %candidate.url, %reason, "Dropping duplicate candidate");
                }
                None => {
                    self.record(&candidate);
                    accepted.push(candidate);
                }
            }
        }
        accepted
    }
}

/// SHA-256 fingerprint over the normalized title and body text.
///
/// `None` when no body is available; URL and title checks carry dedup in
/// that case.
pub fn content_hash(title: &str, body: Option<&str>) -> Option<String> {
    let body = body?;
    let mut hasher = Sha256::new();
    hasher.update(normalize_title(title).as_bytes());
    hasher.update(b"\n\n");
    hasher.update(body.as_bytes());
    Some(format!("{:x}", hasher.finalize()))
}

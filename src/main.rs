//! # Sourcing News
//!
//! A news collection pipeline that crawls many independent web sources,
//! removes duplicates within the run and across historical runs, and
//! produces a bounded, source-diversified digest for downstream reading.
//!
//! ## Features
//!
//! - Config-driven scraping of HTML listing pages with a cascading
//!   selector fallback, plus RSS feed sources (Google News query feeds)
//! - Concurrent fan-out crawling with per-source failure isolation
//! - Two-tier deduplication: exact URL and fuzzy title similarity,
//!   persisted across runs in an append-only history file
//! - Fairness-constrained top-K selection across sources
//! - Optional classification and summarization via an OpenAI-compatible
//!   endpoint, with graceful degradation to a default category
//!
//! ## Usage
//!
//! ```sh
//! sourcing_news -s sources.yaml -j ./json -m ./markdown
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Crawl**: Fetch and extract candidates from every source concurrently
//! 2. **Dedup**: Filter the merged pool against this run and history
//! 3. **Select**: Cap the pool, balancing across sources
//! 4. **Enrich**: Classify and summarize the selected articles (best effort)
//! 5. **Output**: Write JSON and Markdown digests, persist history

use chrono::{Local, Utc};
use clap::Parser;
use futures::stream::{self, StreamExt};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod crawler;
mod dedup;
mod history;
mod models;
mod outputs;
mod select;
mod urls;
mod utils;

use api::{ChatCompleter, Complete, RetryComplete};
use cli::Cli;
use crawler::fetch::HttpFetcher;
use crawler::{CrawlContext, CrawlOptions};
use dedup::{DedupConfig, DedupEngine};
use history::HistoryStore;
use models::{Candidate, Digest, DigestArticle, SeenRecord};
use select::select_top_k;
use utils::{ensure_writable_dir, time_of_day};

/// Selected articles enriched concurrently, this many at a time.
const ENRICH_BATCH_SIZE: usize = 4;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("sourcing_news starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.sources, ?args.json_output_dir, ?args.markdown_output_dir, "Parsed CLI arguments");

    // --- Load and validate the source registry ---
    // The one fatal error class: a registry that configures nothing.
    let registry = match config::load_registry(&args.sources).await {
        Ok(registry) => registry,
        Err(e) => {
            error!(path = %args.sources, error = %e, "Source registry is unusable; aborting");
            return Err(e);
        }
    };
    let sources = registry.all_sources();
    info!(count = sources.len(), "Sources configured");

    // Early check: ensure output dirs are writable
    for dir in [&args.json_output_dir, &args.markdown_output_dir] {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(path = %dir, error = %e, "Output directory is not writable (fix perms or choose a different path)");
            return Err(e);
        }
    }

    // --- History: load once, prune by age ---
    let mut history = HistoryStore::load(&args.history_file).await;
    if let Err(e) = history.prune(args.retention_days).await {
        warn!(error = %e, "History prune failed; continuing with unpruned history");
    }
    let history = Arc::new(history);

    // ---- Crawl all sources ----
    let fetcher = HttpFetcher::new(Duration::from_secs(args.fetch_timeout_secs))?;
    let ctx = CrawlContext::new(Arc::clone(&history));
    let crawl_opts = CrawlOptions {
        max_concurrency: args.max_concurrency,
        deadline: Duration::from_secs(args.crawl_deadline_secs),
    };

    info!(
        sources = sources.len(),
        max_concurrency = crawl_opts.max_concurrency,
        "Starting crawl"
    );
    let merged = crawler::crawl_all(&fetcher, &sources, &registry.gate, &ctx, crawl_opts).await;
    info!(count = merged.len(), "Crawl finished");
    drop(ctx);

    // ---- Dedup the merged pool against this run and history ----
    let dedup_config = DedupConfig {
        cross_run_title_threshold: args.cross_run_title_threshold,
        in_run_title_threshold: args.in_run_title_threshold,
    };
    let mut engine = DedupEngine::new(&history, dedup_config);
    let pool = engine.filter_pool(merged);
    drop(engine);
    info!(count = pool.len(), "Candidates after deduplication");

    // ---- Diversified selection ----
    let selected = select_top_k(pool, args.max_articles);
    info!(count = selected.len(), k = args.max_articles, "Selected articles");

    // ---- Enrichment (best effort, after selection) ----
    let enricher = match &args.enrich_api_key {
        Some(key) => Some(RetryComplete::new(
            ChatCompleter::new(
                args.enrich_base_url.clone(),
                key.clone(),
                args.enrich_model.clone(),
            )?,
            5,
            Duration::from_secs(1),
        )),
        None => {
            info!("No enrichment API key; articles get the default category");
            None
        }
    };

    let articles: Vec<DigestArticle> = stream::iter(selected.iter())
        .map(|candidate| {
            let enricher = enricher.as_ref();
            let registry = &registry;
            async move { enrich_article(candidate, enricher, registry).await }
        })
        .buffered(ENRICH_BATCH_SIZE)
        .collect()
        .await;

    // ---- Persist accepted articles (sequentially, after selection) ----
    let mut history = Arc::into_inner(history).ok_or("history snapshot still shared")?;
    let mut persisted = 0usize;
    for candidate in &selected {
        let record = SeenRecord {
            url: candidate.url.clone(),
            title_normalized: utils::normalize_title(&candidate.title),
            content_hash: dedup::content_hash(&candidate.title, candidate.body.as_deref()),
            saved_at: Utc::now().to_rfc3339(),
        };
        match history.append(record).await {
            Ok(()) => persisted += 1,
            Err(e) => warn!(url = %candidate.url, error = %e, "Failed to persist history record"),
        }
    }
    info!(persisted, total = history.len(), "History updated");

    // ---- Build and write the digest ----
    let digest = Digest {
        local_date: Local::now().date_naive().to_string(),
        time_of_day: time_of_day(),
        local_time: Local::now().time().to_string(),
        articles,
    };

    if let Err(e) = outputs::json::write_digest(&digest, &args.json_output_dir).await {
        error!(error = %e, "Failed to write JSON digest");
    }
    if let Err(e) = outputs::markdown::write_digest(&digest, &args.markdown_output_dir).await {
        error!(error = %e, "Failed to write Markdown digest");
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        articles = digest.articles.len(),
        edition = %digest.time_of_day,
        date = %digest.local_date,
        "Execution complete"
    );

    Ok(())
}

/// Classify and summarize one selected candidate.
///
/// Enrichment failures degrade to the registry's default category and a
/// missing summary; they never drop the article or abort the run.
async fn enrich_article<T: Complete>(
    candidate: &Candidate,
    enricher: Option<&T>,
    registry: &config::Registry,
) -> DigestArticle {
    let categories = match enricher {
        Some(api) => match api::classify(
            api,
            &registry.categories,
            &candidate.title,
            candidate.body.as_deref(),
        )
        .await
        {
            Ok(categories) => categories,
            Err(e) => {
                warn!(title = %candidate.title, error = %e, "Classification failed; using default category");
                vec![registry.default_category.clone()]
            }
        },
        None => vec![registry.default_category.clone()],
    };

    let summary = match (enricher, candidate.body.as_deref()) {
        (Some(api), Some(body)) => match api::summarize(api, &candidate.title, body).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(title = %candidate.title, error = %e, "Summarization failed; digest carries no summary");
                None
            }
        },
        _ => None,
    };

    DigestArticle {
        title: candidate.title.clone(),
        url: candidate.url.clone(),
        source: candidate.source.clone(),
        categories,
        summary,
        collected_at: candidate.extracted_at.clone(),
    }
}

//! Command-line interface definitions.
//!
//! All options can be provided via command-line flags; enrichment
//! credentials also fall back to environment variables.

use clap::Parser;

/// Command-line arguments for the sourcing news collector.
///
/// # Examples
///
/// ```sh
/// # Basic usage
/// sourcing_news -s sources.yaml -j ./json -m ./markdown
///
/// # Tighter selection with a custom history location
/// sourcing_news -s sources.yaml -j ./json -m ./markdown \
///     --max-articles 20 --history-file /var/lib/news/seen.jsonl
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the YAML source registry
    #[arg(short, long, default_value = "sources.yaml")]
    pub sources: String,

    /// Path to the seen-articles history file
    #[arg(long, default_value = "seen_articles.jsonl")]
    pub history_file: String,

    /// Output directory for the JSON digest
    #[arg(short = 'j', long)]
    pub json_output_dir: String,

    /// Output directory for the Markdown digest
    #[arg(short = 'm', long)]
    pub markdown_output_dir: String,

    /// Maximum sources crawled concurrently
    #[arg(long, default_value_t = 10)]
    pub max_concurrency: usize,

    /// Maximum articles in the final digest
    #[arg(short = 'k', long, default_value_t = 30)]
    pub max_articles: usize,

    /// Per-request fetch timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub fetch_timeout_secs: u64,

    /// Overall crawl deadline in seconds
    #[arg(long, default_value_t = 120)]
    pub crawl_deadline_secs: u64,

    /// Days of history kept before pruning
    #[arg(long, default_value_t = 30)]
    pub retention_days: i64,

    /// Similarity threshold for titles against historical articles
    #[arg(long, default_value_t = 0.5)]
    pub cross_run_title_threshold: f64,

    /// Similarity threshold for titles within the current run
    #[arg(long, default_value_t = 0.85)]
    pub in_run_title_threshold: f64,

    /// API key for the enrichment service; enrichment is skipped when absent
    #[arg(long, env = "ENRICH_API_KEY")]
    pub enrich_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible enrichment endpoint
    #[arg(long, env = "ENRICH_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub enrich_base_url: String,

    /// Model name passed to the enrichment endpoint
    #[arg(long, env = "ENRICH_MODEL", default_value = "gpt-4o-mini")]
    pub enrich_model: String,
}

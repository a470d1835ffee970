//! Enrichment service interaction with exponential backoff retry logic.
//!
//! Classification and summarization live behind an OpenAI-compatible chat
//! endpoint. The module uses a trait-based design:
//! - [`Complete`]: core trait for sending one prompt and receiving text
//! - [`ChatCompleter`]: reqwest-backed implementation
//! - [`RetryComplete`]: decorator adding retry logic to any `Complete`
//!
//! Enrichment is strictly best-effort: every failure degrades to the
//! configured default category or a missing summary at the call site, and
//! enrichment runs after selection so it can never eat into the crawl's
//! concurrency budget.
//!
//! # Retry Strategy
//!
//! - Maximum 5 retry attempts
//! - Exponential backoff starting at 1 second
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Trait for async prompt completion.
pub trait Complete {
    /// Send a prompt and receive the model's text response.
    async fn complete(&self, prompt: &str) -> Result<String, Box<dyn Error>>;
}

/// Wrapper that adds exponential backoff retry logic to any [`Complete`]
/// implementation.
///
/// The delay between retries follows:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryComplete<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryComplete<T>
where
    T: Complete,
{
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryComplete<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryComplete")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> Complete for RetryComplete<T>
where
    T: Complete,
{
    #[instrument(level = "debug", skip_all)]
    async fn complete(&self, prompt: &str) -> Result<String, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.complete(prompt).await {
                Ok(resp) => {
                    return Ok(resp);
                }
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u128,
                            error = %e,
                            "complete() exhausted retries"
                        );
                        return Err(e);
                    }

                    // backoff calc
                    let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1));
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        ?delay,
                        error = %e,
                        "complete() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// OpenAI-compatible chat completion client.
#[derive(Debug)]
pub struct ChatCompleter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatCompleter {
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
    ) -> Result<Self, Box<dyn Error>> {
        let client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            base_url,
            api_key,
            model,
        })
    }
}

impl Complete for ChatCompleter {
    #[instrument(level = "debug", skip_all)]
    async fn complete(&self, prompt: &str) -> Result<String, Box<dyn Error>> {
        let request = ChatRequest {
            model: self.model.clone(),
            max_tokens: 1024,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!(
                "enrichment api error {}: {}",
                status,
                crate::utils::truncate_for_log(&body, 200)
            )
            .into());
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| "enrichment api returned no choices".into())
    }
}

/// Ask the model for 1-3 categories for an article.
///
/// Returns only labels present in `categories`; an empty validated result
/// is an error so the caller can apply its default.
#[instrument(level = "debug", skip_all, fields(title = %title))]
pub async fn classify<T: Complete>(
    api: &T,
    categories: &[String],
    title: &str,
    body: Option<&str>,
) -> Result<Vec<String>, Box<dyn Error>> {
    let prompt = classification_prompt(categories, title, body);
    let response = api.complete(&prompt).await?;
    let assigned = parse_categories(&response, categories);
    if assigned.is_empty() {
        return Err("classification returned no known category".into());
    }
    debug!(?assigned, "Classified article");
    Ok(assigned)
}

/// Ask the model for a short summary of an article.
#[instrument(level = "debug", skip_all, fields(title = %title))]
pub async fn summarize<T: Complete>(
    api: &T,
    title: &str,
    body: &str,
) -> Result<String, Box<dyn Error>> {
    let prompt = format!(
        "Summarize this article for procurement professionals in 2-3 plain sentences. \
         Use only facts from the article; include numbers, dates, and companies when present.\n\n\
         Title: {}\n\nArticle:\n{}",
        title, body
    );
    let summary = api.complete(&prompt).await?;
    let summary = summary.trim().to_string();
    if summary.is_empty() {
        return Err("summarization returned empty text".into());
    }
    Ok(summary)
}

fn classification_prompt(categories: &[String], title: &str, body: Option<&str>) -> String {
    use std::fmt::Write;

    let mut prompt = String::from(
        "You are a technology industry classifier. Read the article headline and pick \
         1-3 fitting categories from the list below.\n\nCategories:\n",
    );
    for category in categories {
        writeln!(prompt, "- {}", category).unwrap();
    }
    writeln!(prompt, "\nHeadline: {}", title).unwrap();
    if let Some(body) = body {
        writeln!(
            prompt,
            "Article excerpt: {}",
            crate::utils::truncate_for_log(body, 500)
        )
        .unwrap();
    }
    prompt.push_str("\nRespond with exactly one line in this format:\nCategories: <name>, <name>");
    prompt
}

/// Pull validated category labels out of a model response.
///
/// Tolerates responses with or without the `Categories:` prefix; anything
/// not in the configured list is discarded.
pub fn parse_categories(response: &str, categories: &[String]) -> Vec<String> {
    let line = response
        .lines()
        .find_map(|l| l.split_once("Categories:").map(|(_, rest)| rest))
        .unwrap_or(response);

    let mut assigned = Vec::new();
    for raw in line.split(',') {
        let label = raw.trim().trim_matches(|c| c == '[' || c == ']' || c == '.');
        if let Some(known) = categories.iter().find(|c| c.eq_ignore_ascii_case(label)) {
            if !assigned.contains(known) {
                assigned.push(known.clone());
            }
        }
    }
    assigned.truncate(3);
    assigned
}

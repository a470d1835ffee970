//! Network retrieval with bounded timeouts and normalized failure
//! handling.
//!
//! Every failure at this layer is recoverable: a non-2xx status, a
//! timeout, or a transport error yields a [`FetchError`] that the
//! orchestrator turns into an empty per-source contribution plus a logged
//! event. No retries happen here.

use scraper::{ElementRef, Html, Selector};
use std::error::Error;
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Maximum body text carried per article, in characters.
const BODY_CHAR_CAP: usize = 3000;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; sourcing-news/0.1)";

/// A failed retrieval. All variants are recoverable per-source failures.
#[derive(Debug)]
pub enum FetchError {
    /// The server answered with a non-success status.
    Status(reqwest::StatusCode),
    /// Timeout, DNS, TLS, or any other transport-level failure.
    Transport(reqwest::Error),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "http status {}", status),
            Self::Transport(e) => write!(f, "transport error: {}", e),
        }
    }
}

impl Error for FetchError {}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e)
    }
}

/// Retrieval seam between the orchestrator and the network.
///
/// The orchestrator is generic over this trait so tests can substitute a
/// canned fetcher and exercise fan-out, isolation, and dedup without any
/// network.
pub trait Fetch {
    /// Retrieve one document by URL.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// HTTP fetcher with a mandatory per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, Box<dyn Error>> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        let body = response.text().await?;
        debug!(bytes = body.len(), "Fetched document");
        Ok(body)
    }
}

/// Fetch and extract an article's body text.
///
/// Failures are logged and flattened to `None`: a missing body only
/// disables content-hash dedup and summarization for this candidate.
pub async fn fetch_article_body<F: Fetch>(fetcher: &F, url: &str) -> Option<String> {
    match fetcher.fetch(url).await {
        Ok(html) => extract_body_text(&html),
        Err(e) => {
            warn!(%url, error = %e, "Body fetch failed; continuing without body");
            None
        }
    }
}

/// Pull readable text out of an article page.
///
/// Paragraphs outside page chrome are joined in document order; pages
/// without paragraph markup fall back to `article`/`main` container text.
/// Output is capped at [`BODY_CHAR_CAP`] characters.
pub fn extract_body_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let paragraphs = Selector::parse("p").expect("p selector");

    let mut text = String::new();
    for element in document.select(&paragraphs) {
        if in_page_chrome(&element) {
            continue;
        }
        let piece = element.text().collect::<Vec<_>>().join(" ");
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(piece);
    }

    if text.is_empty() {
        let containers = Selector::parse("article, main").expect("container selector");
        if let Some(container) = document.select(&containers).next() {
            text = container.text().collect::<Vec<_>>().join(" ");
            text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        }
    }

    if text.trim().is_empty() {
        return None;
    }
    Some(truncate_chars(text.trim(), BODY_CHAR_CAP))
}

fn in_page_chrome(element: &ElementRef) -> bool {
    element.ancestors().any(|node| {
        node.value()
            .as_element()
            .map(|el| {
                matches!(
                    el.name(),
                    "nav" | "footer" | "header" | "aside" | "script" | "style"
                )
            })
            .unwrap_or(false)
    })
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_body_prefers_paragraphs() {
        let html = r#"
            <html><body>
              <nav><p>Home | News | About</p></nav>
              <article>
                <p>First paragraph of the story.</p>
                <p>Second paragraph with details.</p>
              </article>
              <footer><p>Copyright 2026</p></footer>
            </body></html>
        "#;
        let body = extract_body_text(html).unwrap();
        assert!(body.contains("First paragraph"));
        assert!(body.contains("Second paragraph"));
        assert!(!body.contains("Copyright"));
        assert!(!body.contains("Home | News"));
    }

    #[test]
    fn test_extract_body_falls_back_to_containers() {
        let html = "<html><body><main>Plain text body without paragraphs</main></body></html>";
        let body = extract_body_text(html).unwrap();
        assert_eq!(body, "Plain text body without paragraphs");
    }

    #[test]
    fn test_extract_body_empty_page() {
        assert_eq!(extract_body_text("<html><body></body></html>"), None);
    }

    #[test]
    fn test_body_is_capped() {
        let long = format!(
            "<html><body><article><p>{}</p></article></body></html>",
            "word ".repeat(2000)
        );
        let body = extract_body_text(&long).unwrap();
        assert!(body.chars().count() <= BODY_CHAR_CAP);
    }
}

//! Candidate extraction from HTML listing pages via a cascading selector
//! strategy.
//!
//! The fallback policy is data, not control flow: the generic container
//! selectors are an ordered list tried in sequence, stopping at the first
//! one that yields more than [`MIN_CONTAINER_MATCHES`] elements.
//! Heterogeneous page structures guarantee some containers are
//! navigation or ads; containers without a usable title and link are
//! skipped silently, which is expected rather than an error.

use crate::config::{KeywordGate, SourceConfig};
use crate::models::Candidate;
use crate::urls;
use chrono::Utc;
use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument, warn};
use url::Url;

/// Titles shorter than this are unusable and dropped at extraction time.
pub const MIN_TITLE_LEN: usize = 10;

/// A primary selector yielding this many containers or fewer triggers the
/// fallback cascade.
pub const MIN_CONTAINER_MATCHES: usize = 3;

/// Containers examined per page, bounding cost on pathological listings.
pub const MAX_CONTAINERS: usize = 100;

/// Generic container selectors tried in order when the configured one
/// comes up short.
pub const FALLBACK_CONTAINER_SELECTORS: &[&str] = &[
    "div.news-item",
    "div.story",
    "li.news",
    "div.article",
    "article",
    "div[class*='article']",
    "div[class*='news']",
];

/// Extract candidates from one fetched listing document.
///
/// Links are resolved to absolute URLs against the source's base URL;
/// candidates failing the keyword gate or the title length bound are
/// dropped here, before any dedup sees them.
#[instrument(level = "debug", skip_all, fields(source = %source.name))]
pub fn extract_candidates(
    document: &str,
    source: &SourceConfig,
    gate: &KeywordGate,
) -> Vec<Candidate> {
    let base = match Url::parse(&source.url) {
        Ok(base) => base,
        Err(e) => {
            warn!(source = %source.name, error = %e, "Unparseable base url; skipping source");
            return Vec::new();
        }
    };

    let html = Html::parse_document(document);
    let containers = resolve_containers(&html, &source.container_selector, &source.name);

    let title_selector = parse_selector(&source.title_selector, "title", &source.name);
    let link_selector = parse_selector(&source.link_selector, "link", &source.name);
    let extracted_at = Utc::now().to_rfc3339();

    let mut candidates = Vec::new();
    for container in containers.into_iter().take(MAX_CONTAINERS) {
        let Some(title) = resolve_title(&container, title_selector.as_ref()) else {
            continue;
        };
        if !gate.admits(&title) {
            debug!(source = %source.name, %title, "Title rejected by keyword gate");
            continue;
        }
        let Some(link) = resolve_link(&container, link_selector.as_ref()) else {
            continue;
        };
        let Some(url) = urls::normalize(&link, &base) else {
            continue;
        };

        candidates.push(Candidate {
            title,
            url,
            source: source.name.clone(),
            body: None,
            extracted_at: extracted_at.clone(),
        });
    }

    // Listing pages routinely link the same article from both a headline
    // and a thumbnail; keep the first occurrence.
    let candidates: Vec<Candidate> = candidates
        .into_iter()
        .unique_by(|c| c.url.clone())
        .collect();

    debug!(source = %source.name, count = candidates.len(), "Extracted candidates");
    candidates
}

/// Apply the container selector cascade.
///
/// The configured primary selector wins outright when it produces more
/// than [`MIN_CONTAINER_MATCHES`] elements; otherwise each fallback is
/// tried in order under the same stop condition. As a last resort the
/// primary's matches (possibly empty) are returned.
fn resolve_containers<'a>(
    html: &'a Html,
    primary: &str,
    source_name: &str,
) -> Vec<ElementRef<'a>> {
    let mut best: Vec<ElementRef> = Vec::new();

    if let Some(selector) = parse_selector(primary, "container", source_name) {
        best = html.select(&selector).collect();
        if best.len() > MIN_CONTAINER_MATCHES {
            return best;
        }
    }

    for fallback in FALLBACK_CONTAINER_SELECTORS {
        let selector = Selector::parse(fallback).expect("fallback selector");
        let matches: Vec<ElementRef> = html.select(&selector).collect();
        if matches.len() > MIN_CONTAINER_MATCHES {
            debug!(source = %source_name, selector = fallback, count = matches.len(),
                   "Primary selector came up short; using fallback");
            return matches;
        }
    }

    best
}

/// Title fallback chain: configured selector, first anchor with usable
/// text, first heading with usable text.
fn resolve_title(container: &ElementRef, configured: Option<&Selector>) -> Option<String> {
    configured
        .and_then(|selector| element_text(container, selector))
        .or_else(|| first_long_text(container, "a"))
        .or_else(|| first_long_text(container, "h1, h2, h3"))
        .filter(|title| title.len() >= MIN_TITLE_LEN)
}

/// Link fallback chain: configured selector with an href, else the first
/// anchor carrying one.
fn resolve_link(container: &ElementRef, configured: Option<&Selector>) -> Option<String> {
    if let Some(selector) = configured {
        if let Some(href) = container
            .select(selector)
            .filter_map(|el| el.value().attr("href"))
            .find(|href| !href.trim().is_empty())
        {
            return Some(href.to_string());
        }
    }

    let anchors = Selector::parse("a").expect("anchor selector");
    container
        .select(&anchors)
        .filter_map(|el| el.value().attr("href"))
        .find(|href| !href.trim().is_empty())
        .map(|href| href.to_string())
}

fn element_text(container: &ElementRef, selector: &Selector) -> Option<String> {
    container
        .select(selector)
        .map(|el| collapse_text(&el))
        .find(|text| !text.is_empty())
}

fn first_long_text(container: &ElementRef, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).expect("static selector");
    container
        .select(&selector)
        .map(|el| collapse_text(&el))
        .find(|text| text.len() > MIN_TITLE_LEN)
}

fn collapse_text(element: &ElementRef) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_selector(raw: &str, field: &str, source_name: &str) -> Option<Selector> {
    if raw.trim().is_empty() {
        return None;
    }
    match Selector::parse(raw) {
        Ok(selector) => Some(selector),
        Err(e) => {
            // The registry validates selectors at load; reaching this
            // means a source bypassed validation.
            warn!(source = %source_name, field, error = %e, "Unparseable selector");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SourceConfig {
        SourceConfig {
            name: "Example Wire".to_string(),
            url: "https://example.com".to_string(),
            listing_url: "https://example.com/news/".to_string(),
            kind: Default::default(),
            container_selector: "div.headline-card".to_string(),
            title_selector: "h2.title".to_string(),
            link_selector: "a.read-more".to_string(),
            fetch_body: false,
        }
    }

    fn open_gate() -> KeywordGate {
        KeywordGate::default()
    }

    #[test]
    fn test_configured_selectors_extract() {
        let html = r#"
            <html><body>
              <div class="headline-card">
                <h2 class="title">Chipmaker expands Dresden fab capacity</h2>
                <a class="read-more" href="/news/dresden-fab">Read</a>
              </div>
              <div class="headline-card">
                <h2 class="title">Battery startup ships first packs</h2>
                <a class="read-more" href="/news/battery-packs">Read</a>
              </div>
              <div class="headline-card">
                <h2 class="title">Port strike delays component imports</h2>
                <a class="read-more" href="/news/port-strike">Read</a>
              </div>
              <div class="headline-card">
                <h2 class="title">OLED panel prices slide further</h2>
                <a class="read-more" href="/news/oled-prices">Read</a>
              </div>
            </body></html>
        "#;
        let candidates = extract_candidates(html, &source(), &open_gate());
        assert_eq!(candidates.len(), 4);
        assert_eq!(candidates[0].title, "Chipmaker expands Dresden fab capacity");
        assert_eq!(candidates[0].url, "https://example.com/news/dresden-fab");
        assert_eq!(candidates[0].source, "Example Wire");
    }

    #[test]
    fn test_fallback_cascade_when_primary_short() {
        // The configured selector matches nothing; `article` (fourth
        // fallback in the list) matches more than three containers.
        let html = r#"
            <html><body>
              <article><a href="/a1">Sensor supplier posts record quarter</a></article>
              <article><a href="/a2">Foundry announces new process node</a></article>
              <article><a href="/a3">Rare earth prices stabilize in Europe</a></article>
              <article><a href="/a4">Robotics firm doubles production line</a></article>
            </body></html>
        "#;
        let candidates = extract_candidates(html, &source(), &open_gate());
        assert_eq!(candidates.len(), 4);
        // Title came from the anchor fallback, link from the same anchor.
        assert_eq!(candidates[0].url, "https://example.com/a1");
    }

    #[test]
    fn test_title_falls_back_to_heading() {
        let html = r#"
            <html><body>
              <div class="headline-card">
                <h3>Display glass shortage hits assembly lines</h3>
                <a href="/no-anchor-text"></a>
              </div>
              <div class="headline-card"><h3>Second usable headline right here</h3><a href="/b"></a></div>
              <div class="headline-card"><h3>Third usable headline right here</h3><a href="/c"></a></div>
              <div class="headline-card"><h3>Fourth usable headline right here</h3><a href="/d"></a></div>
            </body></html>
        "#;
        let mut cfg = source();
        cfg.container_selector = "div.headline-card".to_string();
        let candidates = extract_candidates(html, &cfg, &open_gate());
        assert_eq!(candidates.len(), 4);
        assert_eq!(
            candidates[0].title,
            "Display glass shortage hits assembly lines"
        );
    }

    #[test]
    fn test_short_titles_dropped() {
        let html = r#"
            <html><body>
              <div class="headline-card"><h2 class="title">Too short</h2><a class="read-more" href="/x">Read</a></div>
              <div class="headline-card"><h2 class="title">Long enough headline to keep</h2><a class="read-more" href="/y">Read</a></div>
              <div class="headline-card"><h2 class="title">Another headline that stays in</h2><a class="read-more" href="/z">Read</a></div>
              <div class="headline-card"><h2 class="title">Yet another usable headline here</h2><a class="read-more" href="/w">Read</a></div>
            </body></html>
        "#;
        let candidates = extract_candidates(html, &source(), &open_gate());
        assert_eq!(candidates.len(), 3);
        assert!(candidates.iter().all(|c| c.title.len() >= MIN_TITLE_LEN));
    }

    #[test]
    fn test_container_without_title_or_link_skipped() {
        let html = r#"
            <html><body>
              <div class="headline-card"><span>advertisement</span></div>
              <div class="headline-card"><h2 class="title">Real story with a real link</h2><a class="read-more" href="/real">Read</a></div>
              <div class="headline-card"><h2 class="title">No link on this one, dropped</h2></div>
              <div class="headline-card"><h2 class="title">Another real story with link</h2><a class="read-more" href="/real2">Read</a></div>
            </body></html>
        "#;
        let candidates = extract_candidates(html, &source(), &open_gate());
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn test_keyword_gate_applies() {
        let gate = KeywordGate {
            exclude_keywords: vec!["cryptocurrency".to_string()],
            include_keywords: vec![],
        };
        let html = r#"
            <html><body>
              <div class="headline-card"><h2 class="title">Cryptocurrency rally continues on</h2><a class="read-more" href="/coin">Read</a></div>
              <div class="headline-card"><h2 class="title">Fab utilization back above ninety</h2><a class="read-more" href="/fab">Read</a></div>
              <div class="headline-card"><h2 class="title">Sensor prices fall on oversupply</h2><a class="read-more" href="/sensor">Read</a></div>
              <div class="headline-card"><h2 class="title">Telecom gear orders keep rising</h2><a class="read-more" href="/telecom">Read</a></div>
            </body></html>
        "#;
        let candidates = extract_candidates(html, &source(), &gate);
        assert_eq!(candidates.len(), 3);
        assert!(candidates.iter().all(|c| !c.title.contains("Cryptocurrency")));
    }

    #[test]
    fn test_repeated_links_folded() {
        // Headline and thumbnail cards pointing at the same article.
        let html = r#"
            <html><body>
              <div class="headline-card"><h2 class="title">Story linked twice on the page</h2><a class="read-more" href="/dup">Read</a></div>
              <div class="headline-card"><h2 class="title">Story linked twice on the page</h2><a class="read-more" href="/dup">Read</a></div>
              <div class="headline-card"><h2 class="title">Different story with its own link</h2><a class="read-more" href="/other">Read</a></div>
              <div class="headline-card"><h2 class="title">Yet another distinct story here</h2><a class="read-more" href="/third">Read</a></div>
            </body></html>
        "#;
        let candidates = extract_candidates(html, &source(), &open_gate());
        assert_eq!(candidates.len(), 3);
    }

    #[test]
    fn test_container_cap() {
        let mut html = String::from("<html><body>");
        for i in 0..150 {
            html.push_str(&format!(
                r#"<div class="headline-card"><h2 class="title">Generated headline number {:03}</h2><a class="read-more" href="/gen/{}">Read</a></div>"#,
                i, i
            ));
        }
        html.push_str("</body></html>");
        let candidates = extract_candidates(&html, &source(), &open_gate());
        assert_eq!(candidates.len(), MAX_CONTAINERS);
    }
}

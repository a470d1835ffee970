//! RSS feed parsing for feed-kind sources.
//!
//! Feed sources (Google News query feeds and plain outlet feeds) skip the
//! selector cascade entirely: the document is XML with a fixed shape.
//! Items missing a title or link are skipped silently, mirroring the
//! extractor's handling of unusable containers.

use crate::config::{KeywordGate, SourceConfig};
use crate::crawler::extract::MIN_TITLE_LEN;
use crate::models::Candidate;
use crate::urls;
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

/// Items consumed per feed document.
const MAX_FEED_ITEMS: usize = 10;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(default, rename = "item")]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    /// Google News feeds carry the originating outlet here.
    source: Option<ItemSource>,
}

#[derive(Debug, Deserialize)]
struct ItemSource {
    #[serde(rename = "$text")]
    name: Option<String>,
}

/// Extract candidates from one fetched feed document.
///
/// A document that fails to parse as RSS contributes zero candidates and
/// a warning, like any other garbled per-source document.
#[instrument(level = "debug", skip_all, fields(source = %source.name))]
pub fn extract_feed_candidates(
    document: &str,
    source: &SourceConfig,
    gate: &KeywordGate,
) -> Vec<Candidate> {
    let rss: Rss = match quick_xml::de::from_str(document) {
        Ok(rss) => rss,
        Err(e) => {
            warn!(source = %source.name, error = %e, "Unparseable feed document");
            return Vec::new();
        }
    };

    let base = match Url::parse(&source.url) {
        Ok(base) => base,
        Err(e) => {
            warn!(source = %source.name, error = %e, "Unparseable base url; skipping source");
            return Vec::new();
        }
    };

    let extracted_at = Utc::now().to_rfc3339();
    let mut candidates = Vec::new();
    for item in rss.channel.items.into_iter().take(MAX_FEED_ITEMS) {
        let Some(title) = item.title.map(|t| collapse(&t)).filter(|t| t.len() >= MIN_TITLE_LEN)
        else {
            continue;
        };
        if !gate.admits(&title) {
            debug!(source = %source.name, %title, "Feed title rejected by keyword gate");
            continue;
        }
        let Some(url) = item
            .link
            .as_deref()
            .and_then(|link| urls::normalize(link, &base))
        else {
            continue;
        };

        // The outlet named inside the item beats the feed's own name.
        let outlet = item
            .source
            .and_then(|s| s.name)
            .map(|n| collapse(&n))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| source.name.clone());

        candidates.push(Candidate {
            title,
            url,
            source: outlet,
            body: None,
            extracted_at: extracted_at.clone(),
        });
    }

    debug!(source = %source.name, count = candidates.len(), "Extracted feed candidates");
    candidates
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

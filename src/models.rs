//! Data models for crawled candidates and the published digest.
//!
//! This module defines the core data structures used throughout the pipeline:
//! - [`Candidate`]: A raw article discovered during one crawl run, not yet
//!   confirmed unique
//! - [`SeenRecord`]: The persisted fingerprint of a previously accepted
//!   article, owned by the history store
//! - [`Digest`]: The bounded, source-diversified result set for one edition
//! - [`DigestArticle`]: One accepted article with its assigned categories
//!   and optional summary

use serde::{Deserialize, Serialize};

/// An article discovered during a crawl, before deduplication.
///
/// Candidates are created by the extractor, filtered by the dedup engine,
/// and either dropped or promoted into the digest. The `url` is always
/// absolute and the title is at least [`crate::crawler::extract::MIN_TITLE_LEN`]
/// characters; anything shorter is discarded at extraction time.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// The article headline as extracted from the listing or feed.
    pub title: String,
    /// Absolute, normalized article URL.
    pub url: String,
    /// Name of the configured source that produced this candidate.
    pub source: String,
    /// Article body text, present only for sources that opt into body
    /// fetching. Feeds the content hash and the summarizer.
    pub body: Option<String>,
    /// RFC 3339 timestamp of when the candidate was extracted.
    pub extracted_at: String,
}

/// A persisted fingerprint of a previously accepted article.
///
/// One record per URL. `title_normalized` is the lowercased,
/// whitespace-collapsed headline used for fuzzy matching across runs;
/// `content_hash` is present only when a body was available at acceptance
/// time and catches exact republications behind changed URLs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SeenRecord {
    pub url: String,
    pub title_normalized: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    /// RFC 3339 timestamp of when the article was accepted.
    pub saved_at: String,
}

/// The final article set for one edition, as handed to the presentation
/// layer and written to disk.
///
/// Each execution produces one `Digest`. The `time_of_day` field
/// categorizes editions as:
/// - `"morning"`: 00:00 - 08:00
/// - `"afternoon"`: 08:00 - 16:00
/// - `"evening"`: 16:00 - 24:00
#[derive(Debug, Deserialize, Serialize)]
pub struct Digest {
    /// The date of publication in `YYYY-MM-DD` format.
    pub local_date: String,
    /// The time of day category: "morning", "afternoon", or "evening".
    pub time_of_day: String,
    /// The exact local time of publication.
    pub local_time: String,
    /// The selected articles, capped and balanced across sources.
    pub articles: Vec<DigestArticle>,
}

/// One accepted article in the digest.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DigestArticle {
    pub title: String,
    pub url: String,
    pub source: String,
    /// Categories assigned by the enrichment service, or the configured
    /// default when classification was unavailable or failed.
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// RFC 3339 timestamp of when the article was collected.
    pub collected_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(title: &str, url: &str, source: &str) -> Candidate {
        Candidate {
            title: title.to_string(),
            url: url.to_string(),
            source: source.to_string(),
            body: None,
            extracted_at: "2026-01-05T09:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_candidate_creation() {
        let c = candidate(
            "EU passes new Cyber Resilience Act",
            "https://example.com/cra",
            "Example Wire",
        );
        assert_eq!(c.source, "Example Wire");
        assert!(c.body.is_none());
    }

    #[test]
    fn test_seen_record_roundtrip() {
        let record = SeenRecord {
            url: "https://example.com/cra".to_string(),
            title_normalized: "eu passes new cyber resilience act".to_string(),
            content_hash: None,
            saved_at: "2026-01-05T09:00:00+00:00".to_string(),
        };

        let json = serde_json::to_string(&record).unwrap();
        // Absent hashes are omitted from the persisted line entirely.
        assert!(!json.contains("content_hash"));

        let back: SeenRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.url, record.url);
        assert_eq!(back.content_hash, None);
    }

    #[test]
    fn test_digest_serialization() {
        let digest = Digest {
            local_date: "2026-01-05".to_string(),
            time_of_day: "morning".to_string(),
            local_time: "07:30:00".to_string(),
            articles: vec![DigestArticle {
                title: "Solid-state battery line opens in Gdansk".to_string(),
                url: "https://example.com/battery".to_string(),
                source: "Example Wire".to_string(),
                categories: vec!["Energy/Power".to_string()],
                summary: None,
                collected_at: "2026-01-05T07:00:00+00:00".to_string(),
            }],
        };

        let json = serde_json::to_string(&digest).unwrap();
        assert!(json.contains("2026-01-05"));
        assert!(json.contains("Energy/Power"));

        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.articles.len(), 1);
        assert_eq!(back.time_of_day, "morning");
    }
}

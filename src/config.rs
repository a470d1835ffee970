//! Source registry loading and validation.
//!
//! The registry is a YAML file naming every source the crawler polls, the
//! CSS selectors for its listing page, and the keyword gate applied to
//! extracted headlines. Search queries are expanded into Google News RSS
//! feed sources at load time, so downstream code only ever sees a flat
//! list of [`SourceConfig`] values.
//!
//! The registry is read-only input: it is validated once at startup and
//! never mutated by the pipeline. A registry with no sources at all is the
//! one configuration error treated as fatal.

use scraper::Selector;
use serde::Deserialize;
use std::error::Error;
use tracing::{info, instrument};
use url::Url;

/// How a source's listing document is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// An HTML listing page, walked with the selector cascade.
    #[default]
    Listing,
    /// An RSS feed, parsed as XML.
    Feed,
}

/// One configured origin the crawler polls.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    /// Site base URL; relative article links resolve against this.
    pub url: String,
    /// The page or feed actually fetched.
    pub listing_url: String,
    #[serde(default)]
    pub kind: SourceKind,
    /// Primary selector for article containers (listing sources).
    #[serde(default)]
    pub container_selector: String,
    #[serde(default)]
    pub title_selector: String,
    #[serde(default)]
    pub link_selector: String,
    /// Fetch each candidate's article body. Enables content-hash dedup
    /// and summarization for this source at the cost of one extra request
    /// per candidate.
    #[serde(default)]
    pub fetch_body: bool,
}

/// A Google News search query expanded into a feed source at load time.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedQuery {
    pub query: String,
    /// Interface language, e.g. "en" or "de".
    #[serde(default = "default_lang")]
    pub lang: String,
    /// Edition region, e.g. "US" or "DE".
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_lang() -> String {
    "en".to_string()
}

fn default_region() -> String {
    "US".to_string()
}

impl FeedQuery {
    /// Build the feed source for this query.
    pub fn to_source(&self) -> SourceConfig {
        let listing_url = format!(
            "https://news.google.com/rss/search?q={}&hl={}&ceid={}:{}",
            urlencoding::encode(&self.query),
            self.lang,
            self.region,
            self.lang,
        );
        SourceConfig {
            name: format!("Google News ({})", self.query),
            url: "https://news.google.com".to_string(),
            listing_url,
            kind: SourceKind::Feed,
            container_selector: String::new(),
            title_selector: String::new(),
            link_selector: String::new(),
            fetch_body: false,
        }
    }
}

/// Keyword gate applied to extracted headlines.
///
/// A title passes when it contains no exclude keyword and, if the include
/// list is non-empty, at least one include keyword. Matching is
/// case-insensitive substring containment. Empty lists disable the
/// respective check.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeywordGate {
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
    #[serde(default)]
    pub include_keywords: Vec<String>,
}

impl KeywordGate {
    pub fn admits(&self, title: &str) -> bool {
        let text = title.to_lowercase();
        if self
            .exclude_keywords
            .iter()
            .any(|k| text.contains(&k.to_lowercase()))
        {
            return false;
        }
        if self.include_keywords.is_empty() {
            return true;
        }
        self.include_keywords
            .iter()
            .any(|k| text.contains(&k.to_lowercase()))
    }
}

/// The full parsed registry file.
#[derive(Debug, Clone, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub queries: Vec<FeedQuery>,
    #[serde(flatten)]
    pub gate: KeywordGate,
    /// Category labels the enrichment service may assign.
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default = "default_category")]
    pub default_category: String,
}

fn default_category() -> String {
    "General".to_string()
}

impl Registry {
    /// All sources to crawl: configured listings plus expanded queries.
    pub fn all_sources(&self) -> Vec<SourceConfig> {
        let mut sources = self.sources.clone();
        sources.extend(self.queries.iter().map(FeedQuery::to_source));
        sources
    }

    /// Validate required fields and selector syntax.
    ///
    /// An empty registry (no sources and no queries) is a configuration
    /// integrity violation and the only fatal error class in the pipeline.
    pub fn validate(&self) -> Result<(), Box<dyn Error>> {
        if self.sources.is_empty() && self.queries.is_empty() {
            return Err("registry configures no sources and no queries".into());
        }

        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err("source with empty name".into());
            }
            if Url::parse(&source.url).is_err() {
                return Err(format!("source {}: invalid base url {}", source.name, source.url).into());
            }
            if Url::parse(&source.listing_url).is_err() {
                return Err(format!(
                    "source {}: invalid listing url {}",
                    source.name, source.listing_url
                )
                .into());
            }
            if source.kind == SourceKind::Listing {
                for (field, value) in [
                    ("container_selector", &source.container_selector),
                    ("title_selector", &source.title_selector),
                    ("link_selector", &source.link_selector),
                ] {
                    if value.trim().is_empty() {
                        return Err(format!("source {}: missing {}", source.name, field).into());
                    }
                    if Selector::parse(value).is_err() {
                        return Err(format!(
                            "source {}: unparseable {} `{}`",
                            source.name, field, value
                        )
                        .into());
                    }
                }
            }
        }

        for query in &self.queries {
            if query.query.trim().is_empty() {
                return Err("feed query with empty query string".into());
            }
        }

        Ok(())
    }
}

/// Load and validate the registry from a YAML file.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn load_registry(path: &str) -> Result<Registry, Box<dyn Error>> {
    let raw = tokio::fs::read_to_string(path).await?;
    let registry: Registry = serde_yaml::from_str(&raw)?;
    registry.validate()?;
    info!(
        sources = registry.sources.len(),
        queries = registry.queries.len(),
        "Loaded source registry"
    );
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY_YAML: &str = r#"
default_category: Components
categories:
  - Semiconductors
  - Components
  - Energy/Power
exclude_keywords:
  - cryptocurrency
include_keywords:
  - semiconductor
  - battery
sources:
  - name: Example Wire
    url: https://example.com
    listing_url: https://example.com/news/
    container_selector: div.article
    title_selector: h2 a
    link_selector: h2 a
queries:
  - query: semiconductor Europe price
    lang: de
    region: DE
"#;

    #[test]
    fn test_parse_and_validate() {
        let registry: Registry = serde_yaml::from_str(REGISTRY_YAML).unwrap();
        registry.validate().unwrap();
        assert_eq!(registry.sources.len(), 1);
        assert_eq!(registry.default_category, "Components");
        assert_eq!(registry.gate.include_keywords.len(), 2);
    }

    #[test]
    fn test_query_expansion() {
        let registry: Registry = serde_yaml::from_str(REGISTRY_YAML).unwrap();
        let sources = registry.all_sources();
        assert_eq!(sources.len(), 2);

        let feed = &sources[1];
        assert_eq!(feed.kind, SourceKind::Feed);
        assert!(feed.listing_url.contains("semiconductor%20Europe%20price"));
        assert!(feed.listing_url.contains("hl=de"));
        assert!(feed.listing_url.contains("ceid=DE:de"));
    }

    #[test]
    fn test_empty_registry_rejected() {
        let registry: Registry = serde_yaml::from_str("sources: []\n").unwrap();
        assert!(registry.validate().is_err());
    }

    #[test]
    fn test_bad_selector_rejected() {
        let yaml = r#"
sources:
  - name: Broken
    url: https://example.com
    listing_url: https://example.com/news/
    container_selector: "div[[["
    title_selector: h2
    link_selector: a
"#;
        let registry: Registry = serde_yaml::from_str(yaml).unwrap();
        assert!(registry.validate().is_err());
    }

    #[test]
    fn test_missing_selector_rejected() {
        let yaml = r#"
sources:
  - name: Bare
    url: https://example.com
    listing_url: https://example.com/news/
"#;
        let registry: Registry = serde_yaml::from_str(yaml).unwrap();
        assert!(registry.validate().is_err());
    }

    #[test]
    fn test_keyword_gate() {
        let gate = KeywordGate {
            exclude_keywords: vec!["cryptocurrency".to_string()],
            include_keywords: vec!["semiconductor".to_string(), "battery".to_string()],
        };
        assert!(gate.admits("New semiconductor fab announced"));
        assert!(gate.admits("Solid-state BATTERY breakthrough"));
        assert!(!gate.admits("Cryptocurrency miners buy semiconductor stock"));
        assert!(!gate.admits("Football season opens"));
    }

    #[test]
    fn test_keyword_gate_empty_lists_admit_all() {
        let gate = KeywordGate::default();
        assert!(gate.admits("Anything at all"));
    }
}

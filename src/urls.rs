//! Link normalization against a source's base URL.
//!
//! Listing pages and feeds link articles in three shapes: already-absolute
//! URLs, root-relative paths (`/news/story`), and bare relative paths
//! (`news/story`). All three resolve to absolute URLs here, before any
//! deduplication sees them, so the seen-URL set and history operate on one
//! canonical form.

use url::Url;

/// Resolve a raw link against a source's base URL into an absolute URL.
///
/// Rules:
/// - links already carrying an `http`/`https` scheme pass through unchanged
/// - links starting with `/` join the base's scheme and host
/// - anything else joins the base URL with a path separator
///
/// Deterministic and idempotent: feeding the output back in returns it
/// unchanged. Returns `None` for empty links.
pub fn normalize(raw_link: &str, base: &Url) -> Option<String> {
    let raw = raw_link.trim();
    if raw.is_empty() {
        return None;
    }

    if raw.starts_with("http://") || raw.starts_with("https://") {
        return Some(raw.to_string());
    }

    if let Some(path) = raw.strip_prefix('/') {
        // origin() carries scheme, host, and any non-default port.
        return Some(format!("{}/{}", base.origin().ascii_serialization(), path));
    }

    Some(format!("{}/{}", base.as_str().trim_end_matches('/'), raw))
}

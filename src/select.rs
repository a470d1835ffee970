//! Fairness-constrained top-K selection across sources.
//!
//! Candidates are grouped into per-source buckets and consumed round-robin
//! in stable source order, one per bucket per round. The loop carries an
//! explicit exhaustion flag: a full round that takes nothing means every
//! bucket is drained and the loop terminates, even when fewer than `k`
//! candidates exist. Bucket cursors only ever advance; an article is never
//! selected twice.

use crate::models::Candidate;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// A queue of candidates from one source, with a read cursor.
///
/// The cursor never exceeds the bucket length and never moves backwards.
struct SourceBucket {
    items: Vec<Candidate>,
    cursor: usize,
}

impl SourceBucket {
    fn take_next(&mut self) -> Option<Candidate> {
        let item = self.items.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(item)
    }
}

/// Pick at most `k` candidates, distributing selection fairly across
/// sources.
///
/// The result length is exactly `min(k, candidates.len())`. Buckets are
/// visited in lexicographic source order, making the output a
/// deterministic function of the input pool regardless of how the pool
/// was assembled.
#[instrument(level = "info", skip_all, fields(pool = candidates.len(), k))]
pub fn select_top_k(candidates: Vec<Candidate>, k: usize) -> Vec<Candidate> {
    if k == 0 || candidates.is_empty() {
        return Vec::new();
    }

    // BTreeMap keeps the round-robin scan order stable across runs.
    let mut buckets: BTreeMap<String, SourceBucket> = BTreeMap::new();
    for candidate in candidates {
        buckets
            .entry(candidate.source.clone())
            .or_insert_with(|| SourceBucket {
                items: Vec::new(),
                cursor: 0,
            })
            .items
            .push(candidate);
    }

    let mut selected = Vec::with_capacity(k);
    loop {
        let mut took_this_round = false;
        for (source, bucket) in buckets.iter_mut() {
            if selected.len() == k {
                info!(selected = selected.len(), "Selection cap reached");
                return selected;
            }
            if let Some(candidate) = bucket.take_next() {
                debug!(%source, url = %candidate.url, "Selected candidate");
                selected.push(candidate);
                took_this_round = true;
            }
        }
        if !took_this_round {
            // All buckets exhausted; without this check the scan would
            // spin forever whenever the pool is smaller than k.
            break;
        }
    }

    info!(selected = selected.len(), "All buckets exhausted");
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(source: &str, n: usize) -> Candidate {
        Candidate {
            title: format!("{} headline number {}", source, n),
            url: format!("https://{}.example.com/{}", source, n),
            source: source.to_string(),
            body: None,
            extracted_at: "2026-01-05T09:00:00+00:00".to_string(),
        }
    }

    fn pool(counts: &[(&str, usize)]) -> Vec<Candidate> {
        counts
            .iter()
            .flat_map(|(source, n)| (0..*n).map(|i| candidate(source, i)))
            .collect()
    }

    #[test]
    fn test_cap_is_min_of_k_and_pool() {
        for (counts, k) in [
            (vec![("a", 5), ("b", 5)], 4),
            (vec![("a", 2), ("b", 1)], 10),
            (vec![("a", 0)], 3),
            (vec![], 7),
        ] {
            let p = pool(&counts);
            let total = p.len();
            let selected = select_top_k(p, k);
            assert_eq!(selected.len(), k.min(total));
        }
    }

    #[test]
    fn test_terminates_when_pool_smaller_than_k() {
        // Would loop forever with a cursor-resetting scan.
        let selected = select_top_k(pool(&[("a", 2), ("b", 1)]), 100);
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn test_fairness_across_sources() {
        // Three sources, each with enough candidates for ceil(9/3) picks:
        // every source must land at least floor(9/3) articles.
        let selected = select_top_k(pool(&[("a", 5), ("b", 5), ("c", 5)]), 9);
        assert_eq!(selected.len(), 9);
        for source in ["a", "b", "c"] {
            let from_source = selected.iter().filter(|c| c.source == source).count();
            assert!(from_source >= 3, "source {} got {} picks", source, from_source);
        }
    }

    #[test]
    fn test_no_candidate_selected_twice() {
        let selected = select_top_k(pool(&[("a", 3), ("b", 1)]), 10);
        let mut urls: Vec<&str> = selected.iter().map(|c| c.url.as_str()).collect();
        urls.sort_unstable();
        urls.dedup();
        assert_eq!(urls.len(), selected.len());
    }

    #[test]
    fn test_unbalanced_buckets_drain_fully() {
        // One dominant source must not starve the rest, and once small
        // buckets drain the dominant one fills the remainder.
        let selected = select_top_k(pool(&[("big", 10), ("tiny", 1)]), 6);
        assert_eq!(selected.len(), 6);
        assert_eq!(selected.iter().filter(|c| c.source == "tiny").count(), 1);
        assert_eq!(selected.iter().filter(|c| c.source == "big").count(), 5);
    }

    #[test]
    fn test_deterministic_regardless_of_pool_order() {
        let mut forward = pool(&[("a", 3), ("b", 3), ("c", 3)]);
        let mut reversed = forward.clone();
        reversed.reverse();

        // Same per-source ordering, different arrival interleaving.
        forward.sort_by(|x, y| x.source.cmp(&y.source).then(x.url.cmp(&y.url)));
        reversed.sort_by(|x, y| x.source.cmp(&y.source).then(x.url.cmp(&y.url)));

        let a: Vec<String> = select_top_k(forward, 5).into_iter().map(|c| c.url).collect();
        let b: Vec<String> = select_top_k(reversed, 5).into_iter().map(|c| c.url).collect();
        assert_eq!(a, b);
    }
}

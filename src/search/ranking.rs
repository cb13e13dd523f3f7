//! Merge ordering shared by units, the coordinator and the worker pool.
//!
//! Results are ordered by three criteria, in priority order:
//! 1. normalized text contains the normalized query,
//! 2. normalized text starts with the normalized query,
//! 3. lexicographic order of the normalized text.
//!
//! Identifier and source unit break the remaining ties so the order is total
//! and independent of the order in which unit responses arrived.

use super::tokenizer::normalize;
use super::types::SearchResult;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RankKey {
    misses_phrase: bool,
    misses_prefix: bool,
    normalized: String,
    id: String,
    source: String,
}

impl RankKey {
    /// `query` must already be normalized.
    pub fn new(query: &str, result: &SearchResult) -> Self {
        let normalized = normalize(&result.text);
        Self {
            misses_phrase: !normalized.contains(query),
            misses_prefix: !normalized.starts_with(query),
            normalized,
            id: result.id.clone(),
            source: result.source_unit.clone().unwrap_or_default(),
        }
    }
}

pub fn compare(query: &str, a: &SearchResult, b: &SearchResult) -> Ordering {
    let query = normalize(query);
    RankKey::new(&query, a).cmp(&RankKey::new(&query, b))
}

/// Sorts `results` with the merge comparator and keeps the first `limit`.
pub fn rank_results(query: &str, mut results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    let query = normalize(query);
    results.sort_by_cached_key(|result| RankKey::new(&query, result));
    results.truncate(limit);
    results
}

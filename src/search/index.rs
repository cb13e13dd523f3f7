//! Searchable Index Capability
//!
//! A unit (or pool worker) holds one of two interchangeable index
//! implementations, picked when it is built:
//!
//! - **`TokenIndex`**: forward-tokenized inverted index. Every prefix of every
//!   token points at the records containing it, so a query token matches any
//!   record token it is a prefix of.
//! - **`ScanIndex`**: dependency-free linear matcher over the normalized texts.
//!   Slower, but has nothing to build beyond normalization.
//!
//! Both return offsets into the slice they were built from, best first.
//!
//! Builds run on blocking threads that cannot be aborted from outside, so a
//! builder is handed a [`BuildCancel`] flag and gives up once it is set.

use super::tokenizer::{forward_prefixes, normalize, tokenize_query, tokenize_text};
use crate::error::{SearchError, SearchResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

const PHRASE_SCORE: f64 = 100.0;
const PREFIX_SCORE: f64 = 50.0;
const TOKEN_SCORE: f64 = 10.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    #[default]
    Token,
    Scan,
}

/// A candidate produced by an index: position within the slice plus score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexHit {
    pub offset: usize,
    pub score: f64,
}

/// Shared flag asking an in-flight build to stop.
#[derive(Debug, Clone, Default)]
pub struct BuildCancel(Arc<AtomicBool>);

impl BuildCancel {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

fn cancelled() -> SearchError {
    SearchError::Index("build cancelled".to_string())
}

pub trait SearchableIndex: Send + Sync {
    fn kind(&self) -> IndexKind;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn search(&self, query: &str, limit: usize) -> Vec<IndexHit>;
}

/// Builds an index over a slice of texts.
///
/// Implemented by [`IndexKind`] itself; the worker pool accepts any builder so
/// slow or failing builds can be substituted. Builders should check `cancel`
/// between records and return an error once it is set.
pub trait IndexBuilder: Send + Sync {
    fn kind(&self) -> IndexKind;

    fn build(&self, texts: &[String], cancel: &BuildCancel) -> SearchResult<Box<dyn SearchableIndex>>;
}

impl IndexBuilder for IndexKind {
    fn kind(&self) -> IndexKind {
        *self
    }

    fn build(&self, texts: &[String], cancel: &BuildCancel) -> SearchResult<Box<dyn SearchableIndex>> {
        let index: Box<dyn SearchableIndex> = match self {
            IndexKind::Token => {
                Box::new(TokenIndex::build_cancellable(texts, cancel).ok_or_else(cancelled)?)
            }
            IndexKind::Scan => Box::new(ScanIndex::build(texts)),
        };
        if cancel.is_cancelled() {
            return Err(cancelled());
        }
        Ok(index)
    }
}

/// Scores a normalized text against a normalized query and its tokens.
fn score(text: &str, query: &str, tokens: &[String]) -> f64 {
    let mut score = 0.0;
    if text.contains(query) {
        score += PHRASE_SCORE;
    }
    if text.starts_with(query) {
        score += PREFIX_SCORE;
    }
    for token in tokens {
        if text.contains(token.as_str()) {
            score += TOKEN_SCORE;
        }
    }
    score
}

fn sort_hits(hits: &mut [IndexHit], texts: &[String]) {
    hits.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| texts[a.offset].len().cmp(&texts[b.offset].len()))
            .then_with(|| a.offset.cmp(&b.offset))
    });
}

pub struct TokenIndex {
    normalized: Vec<String>,
    postings: HashMap<String, Vec<usize>>,
}

impl TokenIndex {
    pub fn build(texts: &[String]) -> Self {
        let mut index = Self::with_capacity(texts.len());
        for (offset, text) in texts.iter().enumerate() {
            index.insert(offset, text);
        }
        index
    }

    /// Like [`TokenIndex::build`], but returns `None` once `cancel` is set.
    pub fn build_cancellable(texts: &[String], cancel: &BuildCancel) -> Option<Self> {
        let mut index = Self::with_capacity(texts.len());
        for (offset, text) in texts.iter().enumerate() {
            if cancel.is_cancelled() {
                return None;
            }
            index.insert(offset, text);
        }
        Some(index)
    }

    fn with_capacity(capacity: usize) -> Self {
        Self {
            normalized: Vec::with_capacity(capacity),
            postings: HashMap::new(),
        }
    }

    fn insert(&mut self, offset: usize, text: &str) {
        let mut prefixes = HashSet::new();
        for token in tokenize_text(text) {
            for prefix in forward_prefixes(&token) {
                prefixes.insert(prefix.to_string());
            }
        }
        for prefix in prefixes {
            self.postings.entry(prefix).or_default().push(offset);
        }
        self.normalized.push(normalize(text));
    }

    /// Offsets matching every query token; falls back to offsets matching any
    /// token when the intersection is empty.
    fn candidates(&self, tokens: &[String]) -> Vec<usize> {
        let lists: Vec<&Vec<usize>> = tokens
            .iter()
            .filter_map(|token| self.postings.get(token))
            .collect();

        if lists.len() == tokens.len() {
            let mut all: HashSet<usize> = lists[0].iter().copied().collect();
            for list in &lists[1..] {
                let next: HashSet<usize> = list.iter().copied().collect();
                all.retain(|offset| next.contains(offset));
            }
            if !all.is_empty() {
                return all.into_iter().collect();
            }
        }

        let any: HashSet<usize> = lists.into_iter().flatten().copied().collect();
        any.into_iter().collect()
    }
}

impl SearchableIndex for TokenIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::Token
    }

    fn len(&self) -> usize {
        self.normalized.len()
    }

    fn search(&self, query: &str, limit: usize) -> Vec<IndexHit> {
        let tokens = tokenize_query(query);
        if tokens.is_empty() {
            return Vec::new();
        }
        let query = normalize(query);

        let mut hits: Vec<IndexHit> = self
            .candidates(&tokens)
            .into_iter()
            .map(|offset| IndexHit {
                offset,
                score: score(&self.normalized[offset], &query, &tokens),
            })
            .collect();

        sort_hits(&mut hits, &self.normalized);
        hits.truncate(limit);
        hits
    }
}

pub struct ScanIndex {
    normalized: Vec<String>,
}

impl ScanIndex {
    pub fn build(texts: &[String]) -> Self {
        Self {
            normalized: texts.iter().map(|text| normalize(text)).collect(),
        }
    }
}

impl SearchableIndex for ScanIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::Scan
    }

    fn len(&self) -> usize {
        self.normalized.len()
    }

    fn search(&self, query: &str, limit: usize) -> Vec<IndexHit> {
        let tokens = tokenize_query(query);
        if tokens.is_empty() {
            return Vec::new();
        }
        let query = normalize(query);

        let mut hits: Vec<IndexHit> = self
            .normalized
            .iter()
            .enumerate()
            .filter_map(|(offset, text)| {
                let score = score(text, &query, &tokens);
                (score > 0.0).then_some(IndexHit { offset, score })
            })
            .collect();

        sort_hits(&mut hits, &self.normalized);
        hits.truncate(limit);
        hits
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Result count used when a query does not carry a limit.
pub const DEFAULT_LIMIT: usize = 25;

/// Half-open interval `[start, end)` over the global record positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataRange {
    pub start: usize,
    pub end: usize,
}

impl DataRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Degenerate ranges (`start >= end`) hold no records.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, position: usize) -> bool {
        position >= self.start && position < self.end
    }
}

impl fmt::Display for DataRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// A single corpus entry: a stable identifier plus its searchable text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub text: String,
}

impl Record {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Per-query options. Unknown fields are kept so they take part in cache keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl SearchOptions {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            extra: BTreeMap::new(),
        }
    }

    /// Effective limit; zero or absent falls back to [`DEFAULT_LIMIT`].
    pub fn limit(&self) -> usize {
        self.limit_or(DEFAULT_LIMIT)
    }

    pub fn limit_or(&self, default: usize) -> usize {
        self.limit.filter(|limit| *limit > 0).unwrap_or(default)
    }
}

/// One ranked hit. Units fill `source_unit`/`unit_range` with their own
/// identity; the coordinator re-tags them with what it dispatched to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_range: Option<DataRange>,
}

impl SearchResult {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            score: None,
            source_unit: None,
            unit_range: None,
        }
    }
}

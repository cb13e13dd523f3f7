//! Datastore Collaborator
//!
//! The backing store a unit slices its records from. The unit only needs two
//! things: how many records exist, and an ordered window of them.

use crate::error::{SearchError, SearchResult};
use crate::search::types::Record;

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;

#[async_trait]
pub trait Datastore: Send + Sync {
    async fn count_all(&self) -> SearchResult<usize>;

    /// Records at positions `[start, end)`, in corpus order. Positions past
    /// the end of the corpus are ignored.
    async fn fetch_slice(&self, start: usize, end: usize) -> SearchResult<Vec<Record>>;
}

/// An ordered corpus held in memory.
pub struct MemoryDatastore {
    records: Vec<Record>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FileRecord {
    Text(String),
    Full { id: Option<serde_json::Value>, text: String },
}

impl MemoryDatastore {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Builds a corpus whose identifiers are the global positions.
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let records = texts
            .into_iter()
            .enumerate()
            .map(|(position, text)| Record::new(position.to_string(), text))
            .collect();
        Self { records }
    }

    /// Loads a corpus file.
    ///
    /// `.json` files hold an array of strings or of `{id, text}` objects;
    /// anything else is read as one record per non-blank line.
    pub fn load(path: &Path) -> SearchResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SearchError::Connectivity(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            Self::from_json(&content)
        } else {
            Ok(Self::from_texts(
                content
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty()),
            ))
        }
    }

    pub fn from_json(content: &str) -> SearchResult<Self> {
        let entries: Vec<FileRecord> = serde_json::from_str(content)
            .map_err(|e| SearchError::invalid(format!("Malformed corpus file: {}", e)))?;

        let records = entries
            .into_iter()
            .enumerate()
            .map(|(position, entry)| match entry {
                FileRecord::Text(text) => Record::new(position.to_string(), text),
                FileRecord::Full { id, text } => {
                    let id = match id {
                        Some(serde_json::Value::String(id)) => id,
                        Some(other) => other.to_string(),
                        None => position.to_string(),
                    };
                    Record::new(id, text)
                }
            })
            .collect();

        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl Datastore for MemoryDatastore {
    async fn count_all(&self) -> SearchResult<usize> {
        Ok(self.records.len())
    }

    async fn fetch_slice(&self, start: usize, end: usize) -> SearchResult<Vec<Record>> {
        let end = end.min(self.records.len());
        if start >= end {
            return Ok(Vec::new());
        }
        Ok(self.records[start..end].to_vec())
    }
}

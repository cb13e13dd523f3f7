//! Cache Collaborator
//!
//! The key/value contract the result cache needs from a store: plain values
//! with a TTL, scored sets for the hot-query leaderboard, glob deletion and a
//! liveness ping.
//!
//! `MemoryCacheBackend` keeps everything in a `DashMap` and expires entries
//! lazily on access. It can be switched to a disconnected state to exercise
//! the degrade path.

use crate::error::{SearchError, SearchResult};

use async_trait::async_trait;
use dashmap::DashMap;
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> SearchResult<Option<String>>;

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> SearchResult<()>;

    /// Adds `delta` to `member`'s score in the sorted set at `key` and returns
    /// the new score.
    async fn increment_score(&self, key: &str, member: &str, delta: f64) -> SearchResult<f64>;

    /// Sets a TTL on an existing key. Returns `false` when the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> SearchResult<bool>;

    /// Highest-scored members first; equal scores by member ascending.
    async fn top_by_score(&self, key: &str, n: usize) -> SearchResult<Vec<(String, f64)>>;

    /// Deletes every key matching a glob (`*`, `?`). Returns how many went.
    async fn delete_by_pattern(&self, pattern: &str) -> SearchResult<usize>;

    async fn ping(&self) -> SearchResult<Duration>;

    async fn key_count(&self) -> SearchResult<usize>;
}

/// Translates a glob into an anchored regex.
pub fn glob_to_regex(pattern: &str) -> SearchResult<Regex> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');

    Regex::new(&expr).map_err(|e| SearchError::invalid(format!("Bad pattern {:?}: {}", pattern, e)))
}

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    Scores(HashMap<String, f64>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

pub struct MemoryCacheBackend {
    entries: DashMap<String, Entry>,
    available: AtomicBool,
}

impl Default for MemoryCacheBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCacheBackend {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            available: AtomicBool::new(true),
        }
    }

    /// Simulates losing (or regaining) the connection to the store.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> SearchResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SearchError::Connectivity("cache backend disconnected".to_string()))
        }
    }

    fn evict_if_expired(&self, key: &str) {
        let now = Instant::now();
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn get(&self, key: &str) -> SearchResult<Option<String>> {
        self.ensure_available()?;
        self.evict_if_expired(key);

        Ok(self.entries.get(key).and_then(|entry| match &entry.value {
            Value::Text(text) => Some(text.clone()),
            Value::Scores(_) => None,
        }))
    }

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> SearchResult<()> {
        self.ensure_available()?;
        self.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Text(value),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn increment_score(&self, key: &str, member: &str, delta: f64) -> SearchResult<f64> {
        self.ensure_available()?;
        self.evict_if_expired(key);

        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Scores(HashMap::new()),
            expires_at: None,
        });

        match &mut entry.value {
            Value::Scores(scores) => {
                let score = scores.entry(member.to_string()).or_insert(0.0);
                *score += delta;
                Ok(*score)
            }
            Value::Text(_) => Err(SearchError::invalid(format!(
                "Key {} does not hold a scored set",
                key
            ))),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> SearchResult<bool> {
        self.ensure_available()?;
        self.evict_if_expired(key);

        match self.entries.get_mut(key) {
            Some(mut entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn top_by_score(&self, key: &str, n: usize) -> SearchResult<Vec<(String, f64)>> {
        self.ensure_available()?;
        self.evict_if_expired(key);

        let mut members: Vec<(String, f64)> = match self.entries.get(key) {
            Some(entry) => match &entry.value {
                Value::Scores(scores) => scores.iter().map(|(m, s)| (m.clone(), *s)).collect(),
                Value::Text(_) => Vec::new(),
            },
            None => Vec::new(),
        };

        members.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        members.truncate(n);
        Ok(members)
    }

    async fn delete_by_pattern(&self, pattern: &str) -> SearchResult<usize> {
        self.ensure_available()?;
        let matcher = glob_to_regex(pattern)?;

        let mut removed = 0;
        self.entries.retain(|key, _| {
            let hit = matcher.is_match(key);
            if hit {
                removed += 1;
            }
            !hit
        });
        Ok(removed)
    }

    async fn ping(&self) -> SearchResult<Duration> {
        let start = Instant::now();
        self.ensure_available()?;
        Ok(start.elapsed())
    }

    async fn key_count(&self) -> SearchResult<usize> {
        self.ensure_available()?;
        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        Ok(self.entries.len())
    }
}

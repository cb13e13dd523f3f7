//! Result Cache
//!
//! TTL-bounded acceleration in front of the fan-out path plus the hot-query
//! leaderboard. The cache is strictly an accelerator: every backend failure
//! is logged and turned into a miss or a no-op, never into an error for the
//! caller.
//!
//! ## Keys
//! `search:<scope>:<crc32>:<normalized query>`, cut to `max_key_len`. The
//! checksum covers the normalized query, the scope and the serialized
//! options, so truncation never merges keys that differ only in options.

use super::backend::CacheBackend;
use crate::config::CacheConfig;
use crate::search::tokenizer::normalize;
use crate::search::types::SearchOptions;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const SEARCH_PATTERN: &str = "search:*";
pub const HOT_QUERIES_KEY: &str = "analytics:hot_queries";
pub const SYSTEM_STATS_KEY: &str = "system:stats";

pub fn node_status_key(unit_id: &str) -> String {
    format!("node:status:{}", unit_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlClass {
    SearchResults,
    NodeStatus,
    SystemStats,
    HotQueries,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub key: String,
    pub payload: T,
    /// Milliseconds since the Unix epoch.
    pub cached_at: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotQuery {
    pub query: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheHealth {
    pub status: String,
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub connected: bool,
    pub status: String,
    pub total_keys: Option<usize>,
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    pub config: CacheConfig,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn truncate_on_char_boundary(key: &mut String, max_len: usize) {
    if key.len() <= max_len {
        return;
    }
    let mut cut = max_len;
    while !key.is_char_boundary(cut) {
        cut -= 1;
    }
    key.truncate(cut);
}

pub struct ResultCache {
    backend: Option<Arc<dyn CacheBackend>>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
}

impl ResultCache {
    pub fn new(backend: Arc<dyn CacheBackend>, config: CacheConfig) -> Self {
        let backend = if config.enabled { Some(backend) } else { None };
        Self {
            backend,
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// A cache that never stores anything; every lookup misses.
    pub fn disabled(config: CacheConfig) -> Self {
        Self {
            backend: None,
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn ttl(&self, class: TtlClass) -> Duration {
        let secs = match class {
            TtlClass::SearchResults => self.config.search_results_secs,
            TtlClass::NodeStatus => self.config.node_status_secs,
            TtlClass::SystemStats => self.config.system_stats_secs,
            TtlClass::HotQueries => self.config.hot_queries_secs,
        };
        Duration::from_secs(secs)
    }

    pub fn search_key(&self, query: &str, scope: &str, options: &SearchOptions) -> String {
        let normalized = normalize(query);
        let options_json = serde_json::to_string(options).unwrap_or_default();

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(normalized.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(scope.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(options_json.as_bytes());

        let mut key = format!("search:{}:{:08x}:{}", scope, hasher.finalize(), normalized);
        truncate_on_char_boundary(&mut key, self.config.max_key_len);
        key
    }

    fn degrade(&self, operation: &str, key: &str, err: impl std::fmt::Display) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        tracing::warn!("Cache {} failed for {}, continuing without cache: {}", operation, key, err);
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
        let backend = self.backend.as_ref()?;

        match backend.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<CacheEntry<T>>(&raw) {
                Ok(entry) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!("Cache HIT: {}", key);
                    Some(entry)
                }
                Err(e) => {
                    self.degrade("decode", key, e);
                    None
                }
            },
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Cache MISS: {}", key);
                None
            }
            Err(e) => {
                self.degrade("get", key, e);
                None
            }
        }
    }

    /// Stores `payload` under `key` with the TTL of `class`. Returns whether
    /// the write reached the backend.
    pub async fn put<T: Serialize>(&self, key: &str, payload: &T, class: TtlClass) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };

        let entry = CacheEntry {
            key: key.to_string(),
            payload,
            cached_at: now_millis(),
        };
        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                self.degrade("encode", key, e);
                return false;
            }
        };

        match backend.set_with_ttl(key, raw, self.ttl(class)).await {
            Ok(()) => {
                tracing::debug!("Cached {} (TTL {:?})", key, self.ttl(class));
                true
            }
            Err(e) => {
                self.degrade("put", key, e);
                false
            }
        }
    }

    pub async fn get_search<T: DeserializeOwned>(
        &self,
        query: &str,
        scope: &str,
        options: &SearchOptions,
    ) -> Option<CacheEntry<T>> {
        let key = self.search_key(query, scope, options);
        self.get(&key).await
    }

    pub async fn put_search<T: Serialize>(
        &self,
        query: &str,
        scope: &str,
        options: &SearchOptions,
        payload: &T,
    ) -> bool {
        let key = self.search_key(query, scope, options);
        self.put(&key, payload, TtlClass::SearchResults).await
    }

    /// Bumps the normalized query on the leaderboard and refreshes its TTL.
    pub async fn track_hot_query(&self, query: &str) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        let normalized = normalize(query);
        if normalized.is_empty() {
            return;
        }

        if let Err(e) = backend.increment_score(HOT_QUERIES_KEY, &normalized, 1.0).await {
            self.degrade("hot-query increment", HOT_QUERIES_KEY, e);
            return;
        }
        if let Err(e) = backend
            .expire(HOT_QUERIES_KEY, self.ttl(TtlClass::HotQueries))
            .await
        {
            self.degrade("hot-query expire", HOT_QUERIES_KEY, e);
        }
    }

    pub async fn hot_queries(&self, limit: usize) -> Vec<HotQuery> {
        let Some(backend) = self.backend.as_ref() else {
            return Vec::new();
        };

        match backend.top_by_score(HOT_QUERIES_KEY, limit).await {
            Ok(top) => top
                .into_iter()
                .map(|(query, score)| HotQuery { query, score })
                .collect(),
            Err(e) => {
                self.degrade("hot-query read", HOT_QUERIES_KEY, e);
                Vec::new()
            }
        }
    }

    /// Removes every key matching the glob `pattern`.
    pub async fn invalidate(&self, pattern: &str) -> usize {
        let Some(backend) = self.backend.as_ref() else {
            return 0;
        };

        match backend.delete_by_pattern(pattern).await {
            Ok(removed) => {
                if removed > 0 {
                    tracing::info!("Invalidated {} cache entries matching {}", removed, pattern);
                }
                removed
            }
            Err(e) => {
                self.degrade("invalidate", pattern, e);
                0
            }
        }
    }

    pub async fn health(&self) -> CacheHealth {
        let Some(backend) = self.backend.as_ref() else {
            return CacheHealth {
                status: "disabled".to_string(),
                connected: false,
                response_time_ms: None,
                error: None,
            };
        };

        match backend.ping().await {
            Ok(latency) => CacheHealth {
                status: "healthy".to_string(),
                connected: true,
                response_time_ms: Some(latency.as_secs_f64() * 1000.0),
                error: None,
            },
            Err(e) => CacheHealth {
                status: "disconnected".to_string(),
                connected: false,
                response_time_ms: None,
                error: Some(e.to_string()),
            },
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let (connected, status, total_keys) = match self.backend.as_ref() {
            None => (false, "disabled", None),
            Some(backend) => match backend.key_count().await {
                Ok(count) => (true, "connected", Some(count)),
                Err(e) => {
                    tracing::warn!("Failed to read cache stats: {}", e);
                    (false, "disconnected", None)
                }
            },
        };

        CacheStats {
            connected,
            status: status.to_string(),
            total_keys,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            config: self.config.clone(),
        }
    }
}

use crate::search::types::{DataRange, SearchResult};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    Starting,
    Active,
    Unhealthy,
}

/// Coordinator-side view of one registered unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    pub address: String,
    pub range: DataRange,
    pub status: UnitStatus,
    pub request_count: u64,
    pub average_latency_ms: f64,
    /// Milliseconds since the Unix epoch of the last successful contact.
    pub last_seen: Option<u64>,
}

impl Unit {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            range: DataRange::default(),
            status: UnitStatus::Starting,
            request_count: 0,
            average_latency_ms: 0.0,
            last_seen: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == UnitStatus::Active
    }
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Per-unit outcome of one fan-out round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitBreakdown {
    pub unit_id: String,
    pub success: bool,
    pub result_count: usize,
    pub latency_ms: f64,
    pub data_range: DataRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributedSearchResponse {
    pub search_id: String,
    pub query: String,
    pub results: Vec<SearchResult>,
    pub total_time_ms: f64,
    pub from_cache: bool,
    pub units_queried: usize,
    pub units_successful: usize,
    pub units_failed: usize,
    pub unit_breakdown: Vec<UnitBreakdown>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub search_id: String,
    pub query: String,
    pub total_time_ms: f64,
    pub units_used: usize,
    pub result_count: usize,
    pub from_cache: bool,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total_requests: u64,
    pub average_response_time_ms: f64,
    pub cache_hits: u64,
    pub failed_requests: u64,
    pub history: VecDeque<HistoryEntry>,
}

impl AggregateStats {
    /// Folds one completed search into the running counters, keeping at most
    /// `history_size` history entries.
    pub fn record(&mut self, entry: HistoryEntry, history_size: usize) {
        self.total_requests += 1;
        let n = self.total_requests as f64;
        self.average_response_time_ms =
            (self.average_response_time_ms * (n - 1.0) + entry.total_time_ms) / n;
        if entry.from_cache {
            self.cache_hits += 1;
        }

        self.history.push_front(entry);
        self.history.truncate(history_size);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topology {
    pub total_data_size: usize,
    pub unit_count: usize,
    pub healthy_units: usize,
    pub ranges: Vec<(String, DataRange)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub aggregate: AggregateStats,
    pub units: Vec<Unit>,
    pub topology: Topology,
}

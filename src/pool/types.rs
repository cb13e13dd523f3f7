use crate::search::types::{DataRange, SearchResult};
use serde::{Deserialize, Serialize};

/// Which index a worker ended up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerKind {
    Primary,
    Fallback,
}

/// Per-worker initialization state machine.
///
/// `Pending → Ready{Primary}` on success; `Pending → TimedOutFallbackPending`
/// on timeout (when fallback is enabled), then `Ready{Fallback}` or `Failed`.
/// A build error never falls back. At most one fallback per worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitAttempt {
    Pending,
    TimedOutFallbackPending,
    Ready { kind: WorkerKind },
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStats {
    pub worker_id: String,
    pub kind: WorkerKind,
    pub data_range: DataRange,
    pub searches: u64,
    pub total_time_ms: f64,
    pub average_time_ms: f64,
    pub success_count: u64,
    pub error_count: u64,
}

impl WorkerStats {
    pub fn new(worker_id: impl Into<String>, kind: WorkerKind, data_range: DataRange) -> Self {
        Self {
            worker_id: worker_id.into(),
            kind,
            data_range,
            searches: 0,
            total_time_ms: 0.0,
            average_time_ms: 0.0,
            success_count: 0,
            error_count: 0,
        }
    }

    pub fn record(&mut self, time_ms: f64, success: bool) {
        self.searches += 1;
        if success {
            self.success_count += 1;
            self.total_time_ms += time_ms;
            self.average_time_ms = self.total_time_ms / self.success_count as f64;
        } else {
            self.error_count += 1;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerHealth {
    pub worker_id: String,
    pub healthy: bool,
    pub record_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerBreakdown {
    pub worker_id: String,
    pub success: bool,
    pub result_count: usize,
    pub latency_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSearchResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub total_time_ms: f64,
    pub workers_queried: usize,
    pub workers_successful: usize,
    pub worker_breakdown: Vec<WorkerBreakdown>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStats {
    pub total_searches: u64,
    pub average_search_time_ms: f64,
    pub primary_workers: usize,
    pub fallback_workers: usize,
    pub workers: Vec<WorkerStats>,
    pub errors: Vec<String>,
}

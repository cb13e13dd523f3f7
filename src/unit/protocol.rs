//! Unit Network Protocol
//!
//! Endpoints a search unit serves and the DTOs the coordinator exchanges with
//! it. Everything is JSON over HTTP.

use crate::search::types::{DataRange, SearchOptions, SearchResult};
use serde::{Deserialize, Serialize};

// --- API Endpoints ---

/// Coordinator pushes a new range; the unit rebuilds its index.
pub const ENDPOINT_UPDATE_RANGE: &str = "/update-range";
/// Single-partition search.
pub const ENDPOINT_SEARCH: &str = "/search";
/// Liveness probe.
pub const ENDPOINT_HEALTH: &str = "/health";
/// Unit counters and current slice.
pub const ENDPOINT_STATS: &str = "/stats";
/// Graceful stop request sent by the lifecycle manager.
pub const ENDPOINT_SHUTDOWN: &str = "/shutdown";

// --- Data Transfer Objects ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRangeRequest {
    pub data_range: DataRange,
    pub total_data_size: usize,
    /// Coordinator topology epoch the range belongs to.
    #[serde(default)]
    pub epoch: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRangeResponse {
    pub success: bool,
    pub unit_id: String,
    /// Records held after the update.
    pub item_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitSearchRequest {
    pub query: String,
    #[serde(default)]
    pub options: SearchOptions,
    /// Correlation id of the distributed search this call belongs to.
    #[serde(default)]
    pub search_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitSearchResponse {
    pub results: Vec<SearchResult>,
    pub response_time_ms: f64,
    pub unit_id: String,
    pub data_range: DataRange,
    /// Records the index was built over; zero while nothing is indexed.
    pub total_indexed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitHealthResponse {
    pub status: String,
    pub unit_id: String,
    pub uptime_ms: u64,
}

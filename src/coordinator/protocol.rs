use crate::search::types::{DataRange, SearchOptions};
use serde::{Deserialize, Serialize};

pub const ENDPOINT_REGISTER: &str = "/api/register";
pub const ENDPOINT_DEREGISTER: &str = "/api/deregister";
pub const ENDPOINT_SEARCH: &str = "/api/search";
pub const ENDPOINT_STATUS: &str = "/api/status";
pub const ENDPOINT_STATS: &str = "/api/stats";
pub const ENDPOINT_NODES: &str = "/api/nodes";
pub const ENDPOINT_HEALTH: &str = "/health";
pub const ENDPOINT_UNITS: &str = "/api/units";
pub const ENDPOINT_DATA_SIZE: &str = "/api/data-size";
pub const ENDPOINT_CACHE_HEALTH: &str = "/api/cache/health";
pub const ENDPOINT_CACHE_STATS: &str = "/api/cache/stats";
pub const ENDPOINT_CACHE_HOT: &str = "/api/cache/hot";
pub const ENDPOINT_CACHE_INVALIDATE: &str = "/api/cache/invalidate";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub id: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub unit_id: String,
    pub assigned_range: DataRange,
    pub total_data_size: usize,
    /// Topology epoch `assigned_range` was computed in.
    #[serde(default)]
    pub epoch: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeregisterRequest {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeregisterResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub options: SearchOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetUnitCountRequest {
    /// Signed so that negative requests reach validation instead of failing
    /// deserialization.
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetUnitCountResponse {
    pub success: bool,
    pub current_count: usize,
    pub target_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSizeRequest {
    pub total_data_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSizeResponse {
    pub success: bool,
    pub total_data_size: usize,
    pub unit_count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvalidateRequest {
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidateResponse {
    pub success: bool,
    pub pattern: String,
    pub removed: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HotQueriesParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorHealthResponse {
    pub status: String,
    pub unit_count: usize,
    pub healthy_units: usize,
    pub total_data_size: usize,
}

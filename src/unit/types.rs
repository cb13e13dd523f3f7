use crate::search::index::IndexKind;
use crate::search::types::DataRange;
use serde::{Deserialize, Serialize};

/// Index lifecycle of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitState {
    /// No range received yet.
    Uninitialized,
    /// Holds a built index over a non-empty range.
    Indexed,
    /// Holds a degenerate range; answers every search with zero results.
    Empty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitStats {
    pub unit_id: String,
    pub address: String,
    pub state: UnitState,
    pub index_kind: IndexKind,
    pub data_range: DataRange,
    pub total_data_size: usize,
    pub record_count: usize,
    pub total_searches: u64,
    pub average_response_time_ms: f64,
    pub uptime_ms: u64,
}

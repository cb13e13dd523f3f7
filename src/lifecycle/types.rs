use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleState {
    Starting,
    Running,
    Stopping,
    Exited,
}

/// Emitted by a launched unit over its handle's event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitEvent {
    Output(String),
    /// `requested` is false when nobody asked the unit to stop.
    Exited { code: Option<i32>, requested: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub slot: usize,
    pub unit_id: String,
    /// `host:port` the unit serves on.
    pub address: String,
    pub port: u16,
    pub coordinator_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandleStatus {
    pub unit_id: String,
    pub slot: usize,
    pub address: String,
    pub state: HandleState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleStatus {
    pub current_count: usize,
    pub target_count: usize,
    pub max_units: usize,
    pub units: Vec<HandleStatus>,
}

/// Outcome of one reconcile run. Per-unit failures are listed, not raised.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub success: bool,
    pub current_count: usize,
    pub target_count: usize,
    pub started: Vec<String>,
    pub stopped: Vec<String>,
    pub failures: Vec<String>,
}

//! Worker Pool Module
//!
//! The partition/fan-out/merge algorithm run inside one process: worker
//! tasks take the place of units and message channels take the place of
//! HTTP.
//!
//! ## Submodules
//! - **`service`**: `WorkerPool` startup, search, health and stats.
//! - **`worker`**: the worker task and its message protocol.
//! - **`types`**: init states, stats and responses.

pub mod service;
pub mod types;
pub mod worker;

#[cfg(test)]
mod tests;

//! Unit Lifecycle Module
//!
//! Starts and stops execution units so the live count matches what the
//! operator asked for.
//!
//! ## Submodules
//! - **`manager`**: `LifecycleManager::reconcile` and crash handling.
//! - **`handle`**: the owned handle/control pair for one launched unit.
//! - **`launcher`**: process and in-process launchers.
//! - **`types`**: handle states, events and reports.

pub mod handle;
pub mod launcher;
pub mod manager;
pub mod types;

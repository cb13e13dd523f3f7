//! Lifecycle Manager
//!
//! Reconciles the number of live units to a desired count.
//!
//! ## Reconcile
//! - **Grow**: start the missing units one at a time, pausing for the settle
//!   delay between starts. Each takes the lowest free slot.
//! - **Shrink**: stop the most recently started units (graceful first, forced
//!   after the grace period) and deregister them.
//! - **Bounds**: a desired count above `max_units` is rejected untouched.
//!
//! A unit that exits without being asked is deregistered straight away so
//! the survivors absorb its range.

use super::handle::UnitHandle;
use super::launcher::UnitLauncher;
use super::types::{HandleStatus, LaunchSpec, LifecycleStatus, ReconcileReport, UnitEvent};
use crate::config::LifecycleConfig;
use crate::error::{SearchError, SearchResult};
use crate::unit::client::CoordinatorClient;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, mpsc};

pub struct LifecycleManager {
    config: LifecycleConfig,
    coordinator_url: String,
    launcher: Arc<dyn UnitLauncher>,
    coordinator: Arc<dyn CoordinatorClient>,
    units: Mutex<Vec<UnitHandle>>,
    target: AtomicUsize,
    reconcile_lock: Mutex<()>,
}

impl LifecycleManager {
    pub fn new(
        config: LifecycleConfig,
        coordinator_url: impl Into<String>,
        launcher: Arc<dyn UnitLauncher>,
        coordinator: Arc<dyn CoordinatorClient>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            coordinator_url: coordinator_url.into(),
            launcher,
            coordinator,
            units: Mutex::new(Vec::new()),
            target: AtomicUsize::new(0),
            reconcile_lock: Mutex::new(()),
        })
    }

    pub fn max_units(&self) -> usize {
        self.config.max_units
    }

    pub async fn current_count(&self) -> usize {
        self.units.lock().await.len()
    }

    fn spec_for(&self, slot: usize) -> SearchResult<LaunchSpec> {
        let port = u16::try_from(slot)
            .ok()
            .and_then(|offset| self.config.base_port.checked_add(offset))
            .ok_or_else(|| SearchError::invalid(format!("No port available for slot {}", slot)))?;

        Ok(LaunchSpec {
            slot,
            unit_id: format!("unit-{}", port),
            address: format!("{}:{}", self.config.unit_host, port),
            port,
            coordinator_url: self.coordinator_url.clone(),
        })
    }

    async fn next_free_slot(&self) -> usize {
        let units = self.units.lock().await;
        (0..)
            .find(|slot| units.iter().all(|h| h.spec.slot != *slot))
            .unwrap_or(units.len())
    }

    /// Brings the live unit count to `desired`.
    pub async fn reconcile(self: &Arc<Self>, desired: usize) -> SearchResult<ReconcileReport> {
        if desired > self.config.max_units {
            return Err(SearchError::invalid(format!(
                "Unit count {} outside [0, {}]",
                desired, self.config.max_units
            )));
        }

        let _guard = self.reconcile_lock.lock().await;
        self.target.store(desired, Ordering::SeqCst);

        let current = self.current_count().await;
        tracing::info!("Scaling units from {} to {}", current, desired);

        let mut report = ReconcileReport {
            target_count: desired,
            ..ReconcileReport::default()
        };

        if desired > current {
            self.grow(desired - current, &mut report).await;
        } else if desired < current {
            self.shrink(current - desired, &mut report).await;
        }

        report.current_count = self.current_count().await;
        report.success = report.failures.is_empty();
        Ok(report)
    }

    async fn grow(self: &Arc<Self>, count: usize, report: &mut ReconcileReport) {
        for i in 0..count {
            if i > 0 {
                tokio::time::sleep(self.config.settle_delay()).await;
            }

            let slot = self.next_free_slot().await;
            let spec = match self.spec_for(slot) {
                Ok(spec) => spec,
                Err(e) => {
                    report.failures.push(e.to_string());
                    continue;
                }
            };
            let unit_id = spec.unit_id.clone();

            match self.launcher.launch(spec).await {
                Ok(mut handle) => {
                    // Tracked before watching so an early exit finds the handle to remove.
                    let events = handle.take_events();
                    self.units.lock().await.push(handle);
                    if let Some(events) = events {
                        self.watch(unit_id.clone(), events);
                    }
                    tracing::info!("Unit {} started", unit_id);
                    report.started.push(unit_id);
                }
                Err(e) => {
                    tracing::error!("Failed to start unit {}: {}", unit_id, e);
                    report.failures.push(format!("{}: {}", unit_id, e));
                }
            }
        }
    }

    async fn shrink(&self, count: usize, report: &mut ReconcileReport) {
        for _ in 0..count {
            let Some(mut handle) = self.units.lock().await.pop() else {
                break;
            };
            let unit_id = handle.unit_id().to_string();

            if handle.stop(self.config.grace_period()).await {
                tracing::warn!("Unit {} was force-stopped", unit_id);
            }

            if let Err(e) = self.coordinator.deregister(&unit_id).await {
                tracing::error!("Failed to deregister unit {}: {}", unit_id, e);
                report.failures.push(format!("{}: {}", unit_id, e));
            }

            tracing::info!("Unit {} stopped", unit_id);
            report.stopped.push(unit_id);
        }
    }

    /// Follows a unit's events: output is logged, an unrequested exit
    /// deregisters the unit.
    fn watch(self: &Arc<Self>, unit_id: String, mut events: mpsc::UnboundedReceiver<UnitEvent>) {
        let manager = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    UnitEvent::Output(line) => tracing::info!("[{}] {}", unit_id, line),
                    UnitEvent::Exited {
                        requested: true, ..
                    } => break,
                    UnitEvent::Exited {
                        code,
                        requested: false,
                    } => {
                        tracing::warn!("Unit {} exited unexpectedly (code {:?})", unit_id, code);
                        manager.handle_crash(&unit_id).await;
                        break;
                    }
                }
            }
        });
    }

    async fn handle_crash(&self, unit_id: &str) {
        self.units
            .lock()
            .await
            .retain(|handle| handle.unit_id() != unit_id);

        if let Err(e) = self.coordinator.deregister(unit_id).await {
            tracing::error!("Failed to deregister crashed unit {}: {}", unit_id, e);
        }
    }

    pub async fn status(&self) -> LifecycleStatus {
        let units = self.units.lock().await;
        LifecycleStatus {
            current_count: units.len(),
            target_count: self.target.load(Ordering::SeqCst),
            max_units: self.config.max_units,
            units: units
                .iter()
                .map(|handle| HandleStatus {
                    unit_id: handle.spec.unit_id.clone(),
                    slot: handle.spec.slot,
                    address: handle.spec.address.clone(),
                    state: handle.state(),
                })
                .collect(),
        }
    }

    /// Stops every unit.
    pub async fn shutdown(self: &Arc<Self>) -> SearchResult<ReconcileReport> {
        self.reconcile(0).await
    }
}

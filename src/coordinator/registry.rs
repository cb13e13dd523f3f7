//! Unit registry and range table.
//!
//! Plain data owned by the coordinator behind a single `RwLock`; every
//! mutation happens under one write guard, so readers never observe a range
//! table half way through a redistribution.
//!
//! Each redistribution bumps the topology epoch. Units ignore ranges from an
//! epoch older than one they already hold. The epoch starts at the wall clock
//! in milliseconds so a restarted coordinator still outranks what units hold.

use super::partitioner::partition_ranges;
use super::types::{Unit, UnitStatus, now_millis};
use crate::search::types::DataRange;

/// A range pushed to a unit during a notification round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub unit_id: String,
    pub address: String,
    pub range: DataRange,
    pub epoch: u64,
}

#[derive(Debug, Default)]
pub struct UnitRegistry {
    units: Vec<Unit>,
    total_data_size: usize,
    epoch: u64,
}

impl UnitRegistry {
    pub fn new(total_data_size: usize) -> Self {
        Self {
            units: Vec::new(),
            total_data_size,
            epoch: now_millis(),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn total_data_size(&self) -> usize {
        self.total_data_size
    }

    pub fn set_total_data_size(&mut self, total: usize) {
        self.total_data_size = total;
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Units in registration order.
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn get(&self, id: &str) -> Option<&Unit> {
        self.units.iter().find(|u| u.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Unit> {
        self.units.iter_mut().find(|u| u.id == id)
    }

    /// Adds a unit, or replaces an existing one with the same id in place.
    /// Returns `true` when the id was already known.
    pub fn upsert(&mut self, id: &str, address: &str) -> bool {
        let fresh = Unit::new(id, address);
        match self.get_mut(id) {
            Some(existing) => {
                *existing = fresh;
                true
            }
            None => {
                self.units.push(fresh);
                false
            }
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Unit> {
        let position = self.units.iter().position(|u| u.id == id)?;
        Some(self.units.remove(position))
    }

    /// Recomputes every unit's range from the registration order and returns
    /// the full assignment list.
    pub fn redistribute(&mut self) -> Vec<Assignment> {
        let ranges = partition_ranges(self.total_data_size, self.units.len());
        self.epoch += 1;
        let epoch = self.epoch;

        self.units
            .iter_mut()
            .zip(ranges)
            .map(|(unit, range)| {
                unit.range = range;
                Assignment {
                    unit_id: unit.id.clone(),
                    address: unit.address.clone(),
                    range,
                    epoch,
                }
            })
            .collect()
    }

    pub fn assignment(&self, id: &str) -> Option<Assignment> {
        self.get(id).map(|unit| Assignment {
            unit_id: unit.id.clone(),
            address: unit.address.clone(),
            range: unit.range,
            epoch: self.epoch,
        })
    }

    pub fn healthy(&self) -> Vec<Unit> {
        self.units.iter().filter(|u| u.is_active()).cloned().collect()
    }

    pub fn unhealthy(&self) -> Vec<Unit> {
        self.units
            .iter()
            .filter(|u| u.status == UnitStatus::Unhealthy)
            .cloned()
            .collect()
    }

    /// Successful contact outside a search: the unit becomes active again.
    pub fn mark_contact(&mut self, id: &str) {
        if let Some(unit) = self.get_mut(id) {
            unit.status = UnitStatus::Active;
            unit.last_seen = Some(now_millis());
        }
    }

    /// Successful search call; folds `latency_ms` into the running average.
    pub fn mark_success(&mut self, id: &str, latency_ms: f64) {
        if let Some(unit) = self.get_mut(id) {
            unit.request_count += 1;
            let n = unit.request_count as f64;
            unit.average_latency_ms = (unit.average_latency_ms * (n - 1.0) + latency_ms) / n;
            unit.status = UnitStatus::Active;
            unit.last_seen = Some(now_millis());
        }
    }

    pub fn mark_failure(&mut self, id: &str) {
        if let Some(unit) = self.get_mut(id) {
            unit.status = UnitStatus::Unhealthy;
        }
    }
}

//! Partition Coordinator Module
//!
//! The front door of the cluster: units register here, queries enter here.
//!
//! ## Responsibilities
//! - **Partitioning**: assigns each unit one contiguous range so that all
//!   ranges together cover `[0, N)` with no gaps or overlaps.
//! - **Redistribution**: recomputes and pushes every range whenever units come
//!   or go or the corpus size changes.
//! - **Fan-out/Merge**: queries every healthy unit concurrently under a
//!   per-unit deadline and merges the answers with the shared comparator.
//! - **Health**: demotes units that fail a call, probes them in the
//!   background and re-activates the ones that answer.
//!
//! ## Submodules
//! - **`service`**: the `Coordinator` itself.
//! - **`registry`**: unit table and range assignment.
//! - **`partitioner`**: the chunking arithmetic.
//! - **`client`**: coordinator → unit transport.
//! - **`handlers`**: management HTTP surface.
//! - **`protocol`**: endpoint paths and DTOs.

pub mod client;
pub mod handlers;
pub mod partitioner;
pub mod protocol;
pub mod registry;
pub mod service;
pub mod types;

#[cfg(test)]
mod tests;

//! Partitioned Full-Text Search Library
//!
//! This library crate defines the modules that make up the search cluster.
//! It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! The system is composed of loosely coupled subsystems:
//!
//! - **`coordinator`**: The front door. Splits the corpus into contiguous
//!   ranges, one per registered unit, fans queries out to every healthy unit
//!   and merges the partial answers into one ranked list.
//! - **`unit`**: A search unit. Owns one range, builds an index over it and
//!   answers single-partition queries.
//! - **`lifecycle`**: Starts and stops units to match a requested count, and
//!   deregisters units that crash.
//! - **`cache`**: TTL result cache with hot-query tracking. Every failure
//!   degrades to a miss.
//! - **`pool`**: The same partition/fan-out/merge algorithm inside one
//!   process, with worker tasks in place of units.
//! - **`search`**: Normalization, the two index implementations and the
//!   shared merge ordering.
//! - **`config`** / **`error`**: TOML configuration and the error taxonomy.

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod lifecycle;
pub mod pool;
pub mod search;
pub mod unit;

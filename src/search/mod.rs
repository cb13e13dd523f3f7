//! Search Primitives Module
//!
//! The pieces every search path shares, whatever transport carries it.
//!
//! ## Responsibilities
//! - **Normalization & Tokenization**: one canonical text form for indexing,
//!   matching and ranking.
//! - **Index Capability**: the `SearchableIndex` trait with a token index and a
//!   plain scan fallback.
//! - **Ranking**: the merge comparator used by units, the coordinator and the
//!   in-process worker pool alike.
//!
//! ## Submodules
//! - **`index`**: index trait and its two implementations.
//! - **`ranking`**: the three-level merge order.
//! - **`tokenizer`**: normalization and token helpers.
//! - **`types`**: ranges, records, options and results.

pub mod index;
pub mod ranking;
pub mod tokenizer;
pub mod types;

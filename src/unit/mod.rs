//! Search Unit Module
//!
//! One independently addressable execution context owning one partition of
//! the corpus.
//!
//! ## Responsibilities
//! - **Slicing**: pulls its assigned `[start, end)` window from the datastore.
//! - **Indexing**: rebuilds a fresh index on every range change and swaps it in
//!   atomically.
//! - **Local Search**: ranks candidates with the shared merge comparator.
//! - **Registration**: announces itself to the coordinator on startup.
//!
//! ## Submodules
//! - **`service`**: the `SearchUnit` state machine.
//! - **`datastore`**: the datastore collaborator and an in-memory corpus.
//! - **`client`**: unit → coordinator transport.
//! - **`handlers`**: axum handlers and the unit router.
//! - **`protocol`**: coordinator ↔ unit DTOs.

pub mod client;
pub mod datastore;
pub mod handlers;
pub mod protocol;
pub mod service;
pub mod types;

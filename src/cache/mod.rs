//! Result Cache Module
//!
//! TTL cache in front of the distributed search path.
//!
//! ## Responsibilities
//! - **Acceleration**: deterministic keys per `(query, scope, options)` with
//!   a TTL per payload class.
//! - **Analytics**: a frequency-ranked hot-query leaderboard.
//! - **Invalidation**: glob-pattern busting (`search:*` by default).
//! - **Degradation**: a lost backend turns into misses, never failures.
//!
//! ## Submodules
//! - **`backend`**: the `CacheBackend` collaborator and an in-memory store.
//! - **`manager`**: `ResultCache`, key derivation and TTL classes.
//! - **`handlers`**: cache admin endpoints.

pub mod backend;
pub mod handlers;
pub mod manager;

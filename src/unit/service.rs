//! Search Unit
//!
//! Owns one contiguous slice of the corpus and answers single-partition
//! searches over it.
//!
//! ## Range Updates
//! A new range always triggers a full rebuild: the slice is fetched, a fresh
//! index is built off the async runtime, and only then is the whole slice
//! swapped in behind one write. Readers see either the old slice or the new
//! one, never a mix. A failed fetch or build leaves the previous slice in place.
//!
//! ## Topology Epochs
//! Every range carries the coordinator's topology epoch. A range older than
//! the newest one already accepted is ignored, so a registration reply that
//! arrives after a later push cannot roll the unit back onto a stale range.
//!
//! ## Startup Races
//! Searching before any range arrived (or over a degenerate range) is a
//! successful zero-result answer with `total_indexed = 0`, so a coordinator
//! never demotes a unit for simply being early.

use super::client::CoordinatorClient;
use super::datastore::Datastore;
use super::protocol::{UnitHealthResponse, UnitSearchResponse};
use super::types::{UnitState, UnitStats};
use crate::error::{SearchError, SearchResult};
use crate::search::index::{BuildCancel, IndexBuilder, IndexKind, SearchableIndex};
use crate::search::ranking::rank_results;
use crate::search::types::{DataRange, Record, SearchOptions, SearchResult as Hit};

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};

/// Candidate over-fetch factor before the local merge ordering is applied.
const CANDIDATE_FACTOR: usize = 2;

struct Slice {
    range: DataRange,
    total_data_size: usize,
    records: Vec<Record>,
    index: Option<Box<dyn SearchableIndex>>,
    state: UnitState,
}

impl Slice {
    fn uninitialized() -> Self {
        Self {
            range: DataRange::default(),
            total_data_size: 0,
            records: Vec::new(),
            index: None,
            state: UnitState::Uninitialized,
        }
    }
}

#[derive(Default)]
struct Counters {
    total_searches: u64,
    average_response_time_ms: f64,
}

pub struct SearchUnit {
    pub id: String,
    pub address: String,
    datastore: Arc<dyn Datastore>,
    index_kind: IndexKind,
    slice: RwLock<Arc<Slice>>,
    /// Serializes rebuilds; holds the newest epoch accepted so far.
    rebuild: Mutex<u64>,
    counters: Mutex<Counters>,
    started_at: Instant,
}

impl SearchUnit {
    pub fn new(
        id: impl Into<String>,
        address: impl Into<String>,
        datastore: Arc<dyn Datastore>,
        index_kind: IndexKind,
    ) -> Arc<Self> {
        let id = id.into();
        tracing::info!("Search unit {} initializing, waiting for range assignment", id);

        Arc::new(Self {
            id,
            address: address.into(),
            datastore,
            index_kind,
            slice: RwLock::new(Arc::new(Slice::uninitialized())),
            rebuild: Mutex::new(0),
            counters: Mutex::new(Counters::default()),
            started_at: Instant::now(),
        })
    }

    pub async fn state(&self) -> UnitState {
        self.slice.read().await.state
    }

    pub async fn data_range(&self) -> DataRange {
        self.slice.read().await.range
    }

    /// Replaces the held slice with `range` and rebuilds the index.
    ///
    /// Returns the number of records held afterwards. On error nothing changes.
    /// A range from an epoch older than the newest accepted one is ignored.
    pub async fn update_range(
        &self,
        range: DataRange,
        total_data_size: usize,
        epoch: u64,
    ) -> SearchResult<usize> {
        if range.end > total_data_size && !range.is_empty() {
            return Err(SearchError::invalid(format!(
                "Range {} exceeds data size {}",
                range, total_data_size
            )));
        }

        let mut accepted = self.rebuild.lock().await;
        if epoch < *accepted {
            tracing::debug!(
                "Unit {}: ignoring range {} from epoch {} (holding epoch {})",
                self.id,
                range,
                epoch,
                *accepted
            );
            return Ok(self.slice.read().await.records.len());
        }
        *accepted = epoch;

        {
            let current = self.slice.read().await;
            if current.state != UnitState::Uninitialized
                && current.range == range
                && current.total_data_size == total_data_size
            {
                tracing::debug!("Unit {}: range {} unchanged, keeping index", self.id, range);
                return Ok(current.records.len());
            }
        }

        tracing::info!("Unit {}: updating data range to {}", self.id, range);

        let next = if range.is_empty() {
            Slice {
                range,
                total_data_size,
                records: Vec::new(),
                index: None,
                state: UnitState::Empty,
            }
        } else {
            let records = self.datastore.fetch_slice(range.start, range.end).await?;
            let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
            let kind = self.index_kind;

            let index = tokio::task::spawn_blocking(move || kind.build(&texts, &BuildCancel::default()))
                .await
                .map_err(|e| SearchError::Index(format!("Index build aborted: {}", e)))??;

            Slice {
                range,
                total_data_size,
                records,
                index: Some(index),
                state: UnitState::Indexed,
            }
        };

        let item_count = next.records.len();
        *self.slice.write().await = Arc::new(next);

        tracing::info!(
            "Unit {}: {:?} index ready with {} records (range {})",
            self.id,
            self.index_kind,
            item_count,
            range
        );

        Ok(item_count)
    }

    pub async fn search(&self, query: &str, options: &SearchOptions) -> UnitSearchResponse {
        let start = Instant::now();
        let slice = self.slice.read().await.clone();
        let limit = options.limit();

        let (results, total_indexed) = match (&slice.index, slice.state) {
            (Some(index), UnitState::Indexed) => {
                let hits = index
                    .search(query, limit.saturating_mul(CANDIDATE_FACTOR))
                    .into_iter()
                    .filter_map(|hit| {
                        slice.records.get(hit.offset).map(|record| Hit {
                            id: record.id.clone(),
                            text: record.text.clone(),
                            score: Some(hit.score),
                            source_unit: Some(self.id.clone()),
                            unit_range: Some(slice.range),
                        })
                    })
                    .collect();
                (rank_results(query, hits, limit), slice.records.len())
            }
            _ => {
                tracing::debug!("Unit {}: no data indexed yet, answering empty", self.id);
                (Vec::new(), 0)
            }
        };

        let response_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.record_search(response_time_ms).await;

        tracing::debug!(
            "Unit {}: {} results for {:?} in {:.2}ms",
            self.id,
            results.len(),
            query,
            response_time_ms
        );

        UnitSearchResponse {
            results,
            response_time_ms,
            unit_id: self.id.clone(),
            data_range: slice.range,
            total_indexed,
        }
    }

    async fn record_search(&self, response_time_ms: f64) {
        let mut counters = self.counters.lock().await;
        counters.total_searches += 1;
        let n = counters.total_searches as f64;
        counters.average_response_time_ms =
            (counters.average_response_time_ms * (n - 1.0) + response_time_ms) / n;
    }

    /// Announces this unit to the coordinator and applies the returned range,
    /// unless a newer one was pushed in the meantime. Returns the range held.
    pub async fn register(&self, coordinator: &dyn CoordinatorClient) -> SearchResult<DataRange> {
        let response = coordinator
            .register(&self.id, &self.address)
            .await
            .map_err(|e| SearchError::Connectivity(format!("Registration failed: {}", e)))?;

        if !response.success {
            return Err(SearchError::invalid(
                response
                    .message
                    .unwrap_or_else(|| "Registration rejected".to_string()),
            ));
        }

        tracing::info!(
            "Unit {} registered, assigned range {} of {}",
            self.id,
            response.assigned_range,
            response.total_data_size
        );

        self.update_range(
            response.assigned_range,
            response.total_data_size,
            response.epoch,
        )
        .await?;
        Ok(self.data_range().await)
    }

    pub fn uptime_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    pub fn health(&self) -> UnitHealthResponse {
        UnitHealthResponse {
            status: "healthy".to_string(),
            unit_id: self.id.clone(),
            uptime_ms: self.uptime_ms(),
        }
    }

    pub async fn stats(&self) -> UnitStats {
        let slice = self.slice.read().await.clone();
        let counters = self.counters.lock().await;

        UnitStats {
            unit_id: self.id.clone(),
            address: self.address.clone(),
            state: slice.state,
            index_kind: self.index_kind,
            data_range: slice.range,
            total_data_size: slice.total_data_size,
            record_count: slice.records.len(),
            total_searches: counters.total_searches,
            average_response_time_ms: counters.average_response_time_ms,
            uptime_ms: self.uptime_ms(),
        }
    }
}

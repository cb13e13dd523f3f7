//! Worker Pool
//!
//! In-process variant of the distributed search: the corpus is split across
//! worker tasks exactly as the coordinator splits it across units, queries
//! fan out over message channels and the answers are merged with the shared
//! comparator.
//!
//! ## Initialization
//! Workers initialize concurrently, each bounded by `init_timeout`. A worker
//! that times out is torn down and replaced once by a scan-index worker; one
//! whose build errors is given up on. Tearing a worker down also sets its
//! [`BuildCancel`](crate::search::index::BuildCancel) flag, so the blocking
//! build stops instead of running to completion. The pool starts as long as
//! at least one worker is ready.

use super::types::{
    InitAttempt, PoolSearchResponse, PoolStats, WorkerBreakdown, WorkerHealth, WorkerKind,
    WorkerStats,
};
use super::worker::WorkerHandle;
use crate::config::PoolConfig;
use crate::coordinator::partitioner::partition_ranges;
use crate::error::{SearchError, SearchResult};
use crate::search::index::{IndexBuilder, IndexKind};
use crate::search::ranking::rank_results;
use crate::search::tokenizer::normalize;
use crate::search::types::{DataRange, Record, SearchOptions};

use dashmap::DashMap;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;

struct PoolWorker {
    handle: WorkerHandle,
    kind: WorkerKind,
}

#[derive(Default)]
struct Totals {
    searches: u64,
    average_time_ms: f64,
}

pub struct WorkerPool {
    workers: RwLock<Vec<PoolWorker>>,
    stats: DashMap<String, WorkerStats>,
    totals: Mutex<Totals>,
    errors: Mutex<Vec<String>>,
    config: PoolConfig,
}

/// Drives one worker through the init state machine. Returns the worker
/// that ended up serving, if any, and the final attempt state.
async fn init_worker(
    id: String,
    range: DataRange,
    records: Vec<Record>,
    primary: Arc<dyn IndexBuilder>,
    config: &PoolConfig,
) -> (Option<WorkerHandle>, InitAttempt) {
    let deadline = config.init_timeout();
    let mut worker = WorkerHandle::spawn(id.clone(), range);
    let mut attempt = InitAttempt::Pending;

    loop {
        attempt = match attempt {
            InitAttempt::Pending => {
                match timeout(deadline, worker.init(records.clone(), primary.clone())).await {
                    Ok(Ok(_)) => InitAttempt::Ready {
                        kind: WorkerKind::Primary,
                    },
                    Ok(Err(e)) => InitAttempt::Failed {
                        reason: e.to_string(),
                    },
                    Err(_) if config.use_fallback => {
                        tracing::warn!("Worker {} init timed out, retrying with scan index", id);
                        worker.terminate();
                        worker = WorkerHandle::spawn(id.clone(), range);
                        InitAttempt::TimedOutFallbackPending
                    }
                    Err(_) => InitAttempt::Failed {
                        reason: format!("initialization timed out after {:?}", deadline),
                    },
                }
            }
            InitAttempt::TimedOutFallbackPending => {
                let fallback: Arc<dyn IndexBuilder> = Arc::new(IndexKind::Scan);
                match timeout(deadline, worker.init(records.clone(), fallback)).await {
                    Ok(Ok(_)) => InitAttempt::Ready {
                        kind: WorkerKind::Fallback,
                    },
                    Ok(Err(e)) => InitAttempt::Failed {
                        reason: format!("fallback failed: {}", e),
                    },
                    Err(_) => InitAttempt::Failed {
                        reason: format!("fallback timed out after {:?}", deadline),
                    },
                }
            }
            InitAttempt::Ready { .. } => return (Some(worker), attempt),
            InitAttempt::Failed { .. } => {
                worker.terminate();
                return (None, attempt);
            }
        };
    }
}

impl WorkerPool {
    /// Splits `records` across `config.worker_count` workers and builds their
    /// indexes with `builder`.
    pub async fn start(
        records: Vec<Record>,
        builder: Arc<dyn IndexBuilder>,
        config: PoolConfig,
    ) -> SearchResult<Arc<Self>> {
        if config.worker_count == 0 {
            return Err(SearchError::invalid("Worker count must be at least 1"));
        }

        let ranges = partition_ranges(records.len(), config.worker_count);
        tracing::info!(
            "Starting {} workers over {} records",
            ranges.len(),
            records.len()
        );

        let inits = ranges.iter().enumerate().map(|(i, range)| {
            let slice = records[range.start..range.end].to_vec();
            init_worker(format!("worker-{}", i), *range, slice, builder.clone(), &config)
        });
        let outcomes = join_all(inits).await;

        let mut workers = Vec::new();
        let mut errors = Vec::new();
        let stats = DashMap::new();
        for ((worker, attempt), (i, range)) in outcomes.into_iter().zip(ranges.iter().enumerate()) {
            match (worker, attempt) {
                (Some(handle), InitAttempt::Ready { kind }) => {
                    tracing::info!("Worker {} ready ({:?}) over {}", handle.id, kind, range);
                    stats.insert(handle.id.clone(), WorkerStats::new(&handle.id, kind, *range));
                    workers.push(PoolWorker { handle, kind });
                }
                (_, attempt) => {
                    let message = format!("worker-{}: {:?}", i, attempt);
                    tracing::error!("Worker initialization failed: {}", message);
                    errors.push(message);
                }
            }
        }

        if workers.is_empty() {
            return Err(SearchError::Index(format!(
                "No worker initialized: {}",
                errors.join("; ")
            )));
        }

        let primary = workers.iter().filter(|w| w.kind == WorkerKind::Primary).count();
        tracing::info!(
            "Worker pool ready: {} primary + {} fallback workers",
            primary,
            workers.len() - primary
        );

        Ok(Arc::new(Self {
            workers: RwLock::new(workers),
            stats,
            totals: Mutex::new(Totals::default()),
            errors: Mutex::new(errors),
            config,
        }))
    }

    pub async fn worker_count(&self) -> usize {
        self.workers.read().await.len()
    }

    pub async fn search(&self, query: &str, options: &SearchOptions) -> SearchResult<PoolSearchResponse> {
        if normalize(query).is_empty() {
            return Err(SearchError::invalid("Query must not be empty"));
        }

        let start = Instant::now();
        let limit = options.limit();
        let deadline = self.config.search_timeout();
        let workers = self.workers.read().await;
        if workers.is_empty() {
            return Err(SearchError::EmptyTopology);
        }

        let calls = workers.iter().map(|worker| async move {
            let call_start = Instant::now();
            let outcome = match timeout(deadline, worker.handle.search(query, limit)).await {
                Ok(result) => result,
                Err(_) => Err(SearchError::unavailable(
                    &worker.handle.id,
                    format!("search timed out after {:?}", deadline),
                )),
            };
            (worker, outcome, call_start.elapsed().as_secs_f64() * 1000.0)
        });
        let outcomes = join_all(calls).await;

        let mut merged = Vec::new();
        let mut breakdown = Vec::with_capacity(outcomes.len());
        for (worker, outcome, latency_ms) in outcomes {
            let success = outcome.is_ok();
            if let Some(mut stats) = self.stats.get_mut(&worker.handle.id) {
                stats.record(latency_ms, success);
            }

            match outcome {
                Ok(hits) => {
                    breakdown.push(WorkerBreakdown {
                        worker_id: worker.handle.id.clone(),
                        success: true,
                        result_count: hits.len(),
                        latency_ms,
                        error: None,
                    });
                    merged.extend(hits);
                }
                Err(e) => {
                    tracing::warn!("Worker search failed: {}", e);
                    breakdown.push(WorkerBreakdown {
                        worker_id: worker.handle.id.clone(),
                        success: false,
                        result_count: 0,
                        latency_ms,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        drop(workers);

        let results = rank_results(query, merged, limit);
        let total_time_ms = start.elapsed().as_secs_f64() * 1000.0;

        {
            let mut totals = self.totals.lock().await;
            totals.searches += 1;
            let n = totals.searches as f64;
            totals.average_time_ms = (totals.average_time_ms * (n - 1.0) + total_time_ms) / n;
        }

        let workers_successful = breakdown.iter().filter(|b| b.success).count();
        Ok(PoolSearchResponse {
            query: query.to_string(),
            results,
            total_time_ms,
            workers_queried: breakdown.len(),
            workers_successful,
            worker_breakdown: breakdown,
        })
    }

    pub async fn health_check(&self) -> Vec<WorkerHealth> {
        let workers = self.workers.read().await;
        let checks = workers.iter().map(|worker| async move {
            match timeout(self.config.search_timeout(), worker.handle.health_check()).await {
                Ok(Ok(health)) => health,
                _ => WorkerHealth {
                    worker_id: worker.handle.id.clone(),
                    healthy: false,
                    record_count: 0,
                },
            }
        });
        join_all(checks).await
    }

    pub async fn stats(&self) -> PoolStats {
        let totals = self.totals.lock().await;
        let workers = self.workers.read().await;
        let primary_workers = workers.iter().filter(|w| w.kind == WorkerKind::Primary).count();

        let mut worker_stats: Vec<WorkerStats> =
            self.stats.iter().map(|entry| entry.value().clone()).collect();
        worker_stats.sort_by(|a, b| a.data_range.start.cmp(&b.data_range.start));

        PoolStats {
            total_searches: totals.searches,
            average_search_time_ms: totals.average_time_ms,
            primary_workers,
            fallback_workers: workers.len() - primary_workers,
            workers: worker_stats,
            errors: self.errors.lock().await.clone(),
        }
    }

    /// Terminates every worker. Later searches fail with `EmptyTopology`.
    pub async fn shutdown(&self) {
        let mut workers = self.workers.write().await;
        for worker in workers.iter() {
            worker.handle.terminate();
        }
        let count = workers.len();
        workers.clear();
        tracing::info!("Worker pool shut down ({} workers)", count);
    }
}

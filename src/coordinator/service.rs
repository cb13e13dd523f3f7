//! Partition Coordinator
//!
//! Tracks the registered units, keeps their ranges covering `[0, N)` and runs
//! the fan-out/merge search protocol.
//!
//! ## Topology changes
//! Registration, deregistration and data-size changes are serialized by one
//! topology lock. Each computes every new range under a single registry
//! write, publishes it, then pushes the ranges to all units concurrently. The
//! change is considered stable once every notification settled.
//!
//! ## Searches
//! Searches never take the topology lock. Each reads a snapshot of the
//! healthy units and fans out with an independent deadline per unit; a failed
//! or slow unit only loses its own contribution and is demoted.

use super::client::UnitClient;
use super::protocol::{DeregisterResponse, RegisterResponse};
use super::registry::{Assignment, UnitRegistry};
use super::types::{
    AggregateStats, DistributedSearchResponse, HistoryEntry, SystemStatus, Topology, Unit,
    UnitBreakdown, now_millis,
};
use crate::cache::manager::{ResultCache, SEARCH_PATTERN, SYSTEM_STATS_KEY, TtlClass, node_status_key};
use crate::config::CoordinatorConfig;
use crate::error::{SearchError, SearchResult};
use crate::search::ranking::rank_results;
use crate::search::tokenizer::normalize;
use crate::search::types::SearchOptions;
use crate::unit::client::CoordinatorClient;
use crate::unit::protocol::UnitSearchRequest;

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use uuid::Uuid;

/// Cache scope of merged fan-out results.
pub const DISTRIBUTED_SCOPE: &str = "distributed";

pub struct Coordinator {
    registry: RwLock<UnitRegistry>,
    topology: Mutex<()>,
    stats: Mutex<AggregateStats>,
    client: Arc<dyn UnitClient>,
    cache: Arc<ResultCache>,
    config: CoordinatorConfig,
}

impl Coordinator {
    pub fn new(
        config: CoordinatorConfig,
        total_data_size: usize,
        client: Arc<dyn UnitClient>,
        cache: Arc<ResultCache>,
    ) -> Arc<Self> {
        tracing::info!("Coordinator managing {} records", total_data_size);

        Arc::new(Self {
            registry: RwLock::new(UnitRegistry::new(total_data_size)),
            topology: Mutex::new(()),
            stats: Mutex::new(AggregateStats::default()),
            client,
            cache,
            config,
        })
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub async fn total_data_size(&self) -> usize {
        self.registry.read().await.total_data_size()
    }

    pub async fn unit_count(&self) -> usize {
        self.registry.read().await.len()
    }

    pub async fn nodes(&self) -> Vec<Unit> {
        self.registry.read().await.units().to_vec()
    }

    pub async fn healthy_units(&self) -> Vec<Unit> {
        self.registry.read().await.healthy()
    }

    // --- Topology ---

    /// Adds (or replaces) a unit, redistributes and notifies every unit.
    pub async fn register_unit(&self, id: &str, address: &str) -> SearchResult<RegisterResponse> {
        if id.trim().is_empty() || address.trim().is_empty() {
            return Err(SearchError::invalid("Unit id and address are required"));
        }

        let _topology = self.topology.lock().await;

        let (assignments, total) = {
            let mut registry = self.registry.write().await;
            if registry.upsert(id, address) {
                tracing::info!("Unit {} re-registered at {}", id, address);
            } else {
                tracing::info!("Unit {} registered at {}", id, address);
            }
            (registry.redistribute(), registry.total_data_size())
        };

        self.log_assignments(&assignments, total);
        self.notify_all(&assignments, total).await;

        let assigned = self.registry.read().await.assignment(id);
        let (assigned_range, epoch) = assigned
            .map(|a| (a.range, a.epoch))
            .unwrap_or_default();

        Ok(RegisterResponse {
            success: true,
            unit_id: id.to_string(),
            assigned_range,
            total_data_size: total,
            epoch,
            message: None,
        })
    }

    /// Removes a unit. Unknown ids are a no-op; returns whether one was removed.
    pub async fn deregister_unit(&self, id: &str) -> bool {
        let _topology = self.topology.lock().await;

        let removed = {
            let mut registry = self.registry.write().await;
            registry
                .remove(id)
                .map(|_| (registry.redistribute(), registry.total_data_size()))
        };

        let Some((assignments, total)) = removed else {
            tracing::debug!("Deregistration of unknown unit {} ignored", id);
            return false;
        };

        tracing::info!("Unit {} deregistered, {} units remain", id, assignments.len());
        self.log_assignments(&assignments, total);
        self.notify_all(&assignments, total).await;
        true
    }

    /// Changes the corpus size, redistributes and drops every cached search.
    pub async fn set_total_data_size(&self, total: usize) -> usize {
        let _topology = self.topology.lock().await;

        let assignments = {
            let mut registry = self.registry.write().await;
            registry.set_total_data_size(total);
            registry.redistribute()
        };

        tracing::info!("Total data size set to {}", total);
        self.log_assignments(&assignments, total);
        self.notify_all(&assignments, total).await;
        self.cache.invalidate(SEARCH_PATTERN).await;
        assignments.len()
    }

    fn log_assignments(&self, assignments: &[Assignment], total: usize) {
        tracing::info!(
            "Redistributing {} records across {} units",
            total,
            assignments.len()
        );
        for assignment in assignments {
            tracing::info!("  {} -> {}", assignment.unit_id, assignment.range);
        }
    }

    /// Pushes every assignment concurrently and waits for all to settle.
    /// Success (re)activates a unit; failure demotes it without removing it.
    async fn notify_all(&self, assignments: &[Assignment], total: usize) {
        let deadline = self.config.notify_timeout();

        let calls = assignments.iter().map(|assignment| async move {
            let outcome = timeout(
                deadline,
                self.client
                    .update_range(&assignment.address, assignment.range, total, assignment.epoch),
            )
            .await;

            let result = match outcome {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(format!("timed out after {:?}", deadline)),
            };
            (assignment, result)
        });
        let outcomes = join_all(calls).await;

        {
            let mut registry = self.registry.write().await;
            for (assignment, result) in &outcomes {
                match result {
                    Ok(()) => {
                        tracing::debug!("Unit {} accepted {}", assignment.unit_id, assignment.range);
                        registry.mark_contact(&assignment.unit_id);
                    }
                    Err(reason) => {
                        tracing::warn!(
                            "Failed to notify unit {} of range {}: {}",
                            assignment.unit_id,
                            assignment.range,
                            reason
                        );
                        registry.mark_failure(&assignment.unit_id);
                    }
                }
            }
        }

        self.cache_unit_statuses().await;
    }

    async fn cache_unit_statuses(&self) {
        if !self.cache.is_enabled() {
            return;
        }
        let units = self.nodes().await;
        for unit in &units {
            self.cache
                .put(&node_status_key(&unit.id), unit, TtlClass::NodeStatus)
                .await;
        }
    }

    // --- Search ---

    pub async fn distributed_search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> SearchResult<DistributedSearchResponse> {
        if normalize(query).is_empty() {
            return Err(SearchError::invalid("Query must not be empty"));
        }

        let start = Instant::now();
        let search_id = format!("search-{}", Uuid::new_v4());

        self.cache.track_hot_query(query).await;

        if let Some(entry) = self
            .cache
            .get_search::<DistributedSearchResponse>(query, DISTRIBUTED_SCOPE, options)
            .await
        {
            let mut response = entry.payload;
            response.search_id = search_id;
            response.from_cache = true;
            response.total_time_ms = start.elapsed().as_secs_f64() * 1000.0;

            tracing::info!("Search {:?} served from cache", query);
            self.record(&response).await;
            return Ok(response);
        }

        let healthy = self.healthy_units().await;
        if healthy.is_empty() {
            self.stats.lock().await.failed_requests += 1;
            tracing::warn!("Search {:?} rejected: no healthy units", query);
            return Err(SearchError::EmptyTopology);
        }

        let limit = options.limit_or(self.config.default_limit);
        let request = UnitSearchRequest {
            query: query.to_string(),
            options: SearchOptions {
                limit: Some(limit),
                extra: options.extra.clone(),
            },
            search_id: Some(search_id.clone()),
        };

        tracing::info!(
            "Search {} {:?}: fanning out to {} units",
            search_id,
            query,
            healthy.len()
        );

        let deadline = self.config.search_timeout();
        let request = &request;
        let calls = healthy.iter().map(|unit| async move {
            let call_start = Instant::now();
            let outcome = timeout(deadline, self.client.search(&unit.address, request)).await;
            let latency_ms = call_start.elapsed().as_secs_f64() * 1000.0;

            let result = match outcome {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(e)) => Err(SearchError::unavailable(&unit.id, e)),
                Err(_) => Err(SearchError::unavailable(
                    &unit.id,
                    format!("timed out after {:?}", deadline),
                )),
            };
            (unit, result, latency_ms)
        });
        let outcomes = join_all(calls).await;

        let mut merged = Vec::new();
        let mut breakdown = Vec::with_capacity(outcomes.len());
        {
            let mut registry = self.registry.write().await;
            for (unit, result, latency_ms) in outcomes {
                match result {
                    Ok(response) => {
                        tracing::debug!(
                            "Unit {} returned {} results in {:.1}ms",
                            unit.id,
                            response.results.len(),
                            latency_ms
                        );
                        registry.mark_success(&unit.id, latency_ms);
                        breakdown.push(UnitBreakdown {
                            unit_id: unit.id.clone(),
                            success: true,
                            result_count: response.results.len(),
                            latency_ms,
                            data_range: unit.range,
                            error: None,
                        });
                        merged.extend(response.results.into_iter().map(|mut hit| {
                            hit.source_unit = Some(unit.id.clone());
                            hit.unit_range = Some(unit.range);
                            hit
                        }));
                    }
                    Err(e) => {
                        tracing::warn!("Search {}: {}", search_id, e);
                        registry.mark_failure(&unit.id);
                        breakdown.push(UnitBreakdown {
                            unit_id: unit.id.clone(),
                            success: false,
                            result_count: 0,
                            latency_ms,
                            data_range: unit.range,
                            error: Some(e.to_string()),
                        });
                    }
                }
            }
        }

        let results = rank_results(query, merged, limit);
        let units_successful = breakdown.iter().filter(|b| b.success).count();

        let response = DistributedSearchResponse {
            search_id,
            query: query.to_string(),
            results,
            total_time_ms: start.elapsed().as_secs_f64() * 1000.0,
            from_cache: false,
            units_queried: breakdown.len(),
            units_successful,
            units_failed: breakdown.len() - units_successful,
            unit_breakdown: breakdown,
        };

        tracing::info!(
            "Search {} {:?}: {} results from {}/{} units in {:.1}ms",
            response.search_id,
            query,
            response.results.len(),
            response.units_successful,
            response.units_queried,
            response.total_time_ms
        );

        self.record(&response).await;
        if !response.results.is_empty() {
            self.cache
                .put_search(query, DISTRIBUTED_SCOPE, options, &response)
                .await;
        }

        Ok(response)
    }

    async fn record(&self, response: &DistributedSearchResponse) {
        let entry = HistoryEntry {
            search_id: response.search_id.clone(),
            query: response.query.clone(),
            total_time_ms: response.total_time_ms,
            units_used: response.units_successful,
            result_count: response.results.len(),
            from_cache: response.from_cache,
            timestamp: now_millis(),
        };
        self.stats.lock().await.record(entry, self.config.history_size);
    }

    // --- Status ---

    pub async fn aggregate_stats(&self) -> AggregateStats {
        self.stats.lock().await.clone()
    }

    /// Aggregate stats as last written to the cache, refreshed on a miss.
    pub async fn cached_aggregate_stats(&self) -> AggregateStats {
        if let Some(entry) = self.cache.get::<AggregateStats>(SYSTEM_STATS_KEY).await {
            return entry.payload;
        }
        let stats = self.aggregate_stats().await;
        self.cache.put(SYSTEM_STATS_KEY, &stats, TtlClass::SystemStats).await;
        stats
    }

    pub async fn topology(&self) -> Topology {
        let registry = self.registry.read().await;
        Topology {
            total_data_size: registry.total_data_size(),
            unit_count: registry.len(),
            healthy_units: registry.units().iter().filter(|u| u.is_active()).count(),
            ranges: registry
                .units()
                .iter()
                .map(|u| (u.id.clone(), u.range))
                .collect(),
        }
    }

    pub async fn status(&self) -> SystemStatus {
        let aggregate = self.aggregate_stats().await;
        let units = self.nodes().await;
        let topology = self.topology().await;

        self.cache
            .put(SYSTEM_STATS_KEY, &aggregate, TtlClass::SystemStats)
            .await;

        SystemStatus {
            aggregate,
            units,
            topology,
        }
    }

    // --- Health probing ---

    /// Probes every unhealthy unit once. A unit that answers is re-sent its
    /// current range and re-activated. Returns how many recovered.
    pub async fn probe_unhealthy(&self) -> usize {
        let _topology = self.topology.lock().await;

        let (candidates, total, epoch) = {
            let registry = self.registry.read().await;
            (registry.unhealthy(), registry.total_data_size(), registry.epoch())
        };
        if candidates.is_empty() {
            return 0;
        }

        let deadline = self.config.notify_timeout();
        let probes = candidates.iter().map(|unit| async move {
            let alive = matches!(timeout(deadline, self.client.health(&unit.address)).await, Ok(Ok(_)));
            if !alive {
                return false;
            }
            matches!(
                timeout(deadline, self.client.update_range(&unit.address, unit.range, total, epoch)).await,
                Ok(Ok(_))
            )
        });
        let outcomes = join_all(probes).await;

        let mut recovered = 0;
        {
            let mut registry = self.registry.write().await;
            for (unit, ok) in candidates.iter().zip(outcomes) {
                if ok {
                    tracing::info!("Unit {} recovered, range {} re-sent", unit.id, unit.range);
                    registry.mark_contact(&unit.id);
                    recovered += 1;
                } else {
                    tracing::debug!("Unit {} still unhealthy", unit.id);
                }
            }
        }

        if recovered > 0 {
            self.cache_unit_statuses().await;
        }
        recovered
    }

    /// Runs [`Self::probe_unhealthy`] every health-check interval.
    pub fn spawn_health_checks(self: &Arc<Self>) -> JoinHandle<()> {
        let coordinator = self.clone();
        let period = self.config.health_check_interval();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                coordinator.probe_unhealthy().await;
            }
        })
    }
}

/// Lets in-process collaborators (the lifecycle manager, in-process units)
/// talk to the coordinator without a network hop.
#[async_trait]
impl CoordinatorClient for Coordinator {
    async fn register(&self, unit_id: &str, address: &str) -> anyhow::Result<RegisterResponse> {
        Ok(self.register_unit(unit_id, address).await?)
    }

    async fn deregister(&self, unit_id: &str) -> anyhow::Result<DeregisterResponse> {
        self.deregister_unit(unit_id).await;
        Ok(DeregisterResponse { success: true })
    }
}

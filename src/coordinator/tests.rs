//! Coordinator Module Tests
//!
//! ## Test Scopes
//! - **Partitioning**: chunk arithmetic, coverage, idempotence.
//! - **Registry**: in-place replacement, assignment order.
//! - **Topology**: registration, deregistration and size changes push ranges.
//! - **Fan-out/Merge**: partial failures, timeouts, empty topology, caching.
//! - **Health**: demotion on failed notification and recovery by probing.
//! - **HTTP**: one loopback round trip through the real routers.
//!
//! Units are real `SearchUnit`s reached through an in-memory `UnitClient`, so
//! failures and delays can be injected per address.

#[cfg(test)]
mod tests {
    use crate::cache::backend::MemoryCacheBackend;
    use crate::cache::manager::ResultCache;
    use crate::config::{CacheConfig, CoordinatorConfig};
    use crate::coordinator::client::{HttpUnitClient, UnitClient};
    use crate::coordinator::handlers::router;
    use crate::coordinator::partitioner::partition_ranges;
    use crate::coordinator::protocol::{DeregisterResponse, RegisterResponse, SearchRequest};
    use crate::coordinator::registry::UnitRegistry;
    use crate::coordinator::service::Coordinator;
    use crate::coordinator::types::{DistributedSearchResponse, UnitStatus};
    use crate::error::{ErrorResponse, SearchError};
    use crate::search::index::IndexKind;
    use crate::search::types::{DataRange, SearchOptions};
    use crate::unit::client::CoordinatorClient;
    use crate::unit::datastore::{Datastore, MemoryDatastore};
    use crate::unit::handlers::serve;
    use crate::unit::protocol::{
        UnitHealthResponse, UnitSearchRequest, UnitSearchResponse, UpdateRangeResponse,
    };
    use crate::unit::service::SearchUnit;

    use async_trait::async_trait;
    use dashmap::{DashMap, DashSet};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};
    use tokio::net::TcpListener;
    use tokio::sync::Notify;

    /// Routes calls straight to in-memory units keyed by address.
    #[derive(Default)]
    struct LocalUnitClient {
        units: DashMap<String, Arc<SearchUnit>>,
        failing: DashSet<String>,
        slow: DashMap<String, Duration>,
        search_calls: AtomicUsize,
    }

    impl LocalUnitClient {
        fn check(&self, address: &str) -> anyhow::Result<Arc<SearchUnit>> {
            if self.failing.contains(address) {
                return Err(anyhow::anyhow!("connection refused: {}", address));
            }
            self.units
                .get(address)
                .map(|u| u.clone())
                .ok_or_else(|| anyhow::anyhow!("no unit at {}", address))
        }
    }

    #[async_trait]
    impl UnitClient for LocalUnitClient {
        async fn update_range(
            &self,
            address: &str,
            range: DataRange,
            total_data_size: usize,
            epoch: u64,
        ) -> anyhow::Result<UpdateRangeResponse> {
            let unit = self.check(address)?;
            let item_count = unit.update_range(range, total_data_size, epoch).await?;
            Ok(UpdateRangeResponse {
                success: true,
                unit_id: unit.id.clone(),
                item_count,
                message: None,
            })
        }

        async fn search(
            &self,
            address: &str,
            request: &UnitSearchRequest,
        ) -> anyhow::Result<UnitSearchResponse> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            let delay = self.slow.get(address).map(|d| *d);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let unit = self.check(address)?;
            Ok(unit.search(&request.query, &request.options).await)
        }

        async fn health(&self, address: &str) -> anyhow::Result<UnitHealthResponse> {
            Ok(self.check(address)?.health())
        }
    }

    /// Registers through the coordinator but hands the reply back late.
    struct DelayedReplies {
        coordinator: Arc<Coordinator>,
        delay: Duration,
    }

    #[async_trait]
    impl CoordinatorClient for DelayedReplies {
        async fn register(&self, unit_id: &str, address: &str) -> anyhow::Result<RegisterResponse> {
            let response = self.coordinator.register(unit_id, address).await?;
            tokio::time::sleep(self.delay).await;
            Ok(response)
        }

        async fn deregister(&self, unit_id: &str) -> anyhow::Result<DeregisterResponse> {
            self.coordinator.deregister(unit_id).await
        }
    }

    struct Cluster {
        coordinator: Arc<Coordinator>,
        client: Arc<LocalUnitClient>,
        datastore: Arc<dyn Datastore>,
    }

    impl Cluster {
        fn new(texts: &[&str], config: CoordinatorConfig) -> Self {
            let datastore: Arc<dyn Datastore> =
                Arc::new(MemoryDatastore::from_texts(texts.iter().copied()));
            let client = Arc::new(LocalUnitClient::default());
            let cache = Arc::new(ResultCache::new(
                Arc::new(MemoryCacheBackend::new()),
                CacheConfig::default(),
            ));
            let coordinator = Coordinator::new(config, texts.len(), client.clone(), cache);
            Self {
                coordinator,
                client,
                datastore,
            }
        }

        /// Creates a reachable unit without registering it.
        fn spawn_unit(&self, id: &str) -> Arc<SearchUnit> {
            let address = format!("{}.local:80", id);
            let unit = SearchUnit::new(id, address.clone(), self.datastore.clone(), IndexKind::Token);
            self.client.units.insert(address, unit.clone());
            unit
        }

        /// Creates a unit and registers it, returning what the coordinator sent back.
        async fn add_unit(&self, id: &str) -> RegisterResponse {
            let unit = self.spawn_unit(id);
            self.coordinator
                .register_unit(id, &unit.address)
                .await
                .unwrap()
        }

        fn unit(&self, id: &str) -> Arc<SearchUnit> {
            self.client
                .units
                .get(&format!("{}.local:80", id))
                .map(|u| u.clone())
                .unwrap()
        }

        fn fail(&self, id: &str) {
            self.client.failing.insert(format!("{}.local:80", id));
        }

        fn heal(&self, id: &str) {
            self.client.failing.remove(&format!("{}.local:80", id));
        }
    }

    fn fast_config() -> CoordinatorConfig {
        CoordinatorConfig {
            search_timeout_ms: 200,
            notify_timeout_ms: 200,
            ..CoordinatorConfig::default()
        }
    }

    fn numbered(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("Record {}", i)).collect()
    }

    const MOVIES: [&str; 6] = [
        "Batman Begins",
        "The Dark Knight",
        "Catwoman",
        "Dune",
        "Dune Messiah",
        "Batman Returns",
    ];

    // ============================================================
    // PARTITIONING TESTS
    // ============================================================

    #[test]
    fn test_partition_example() {
        let ranges = partition_ranges(100, 3);
        assert_eq!(
            ranges,
            vec![
                DataRange::new(0, 34),
                DataRange::new(34, 67),
                DataRange::new(67, 100)
            ]
        );
    }

    #[test]
    fn test_partition_covers_without_gaps_or_overlaps() {
        for total in [0, 1, 2, 5, 99, 100, 101, 1000] {
            for units in 1..=12 {
                let ranges = partition_ranges(total, units);

                assert_eq!(ranges.len(), units);
                assert_eq!(ranges[0].start, 0);
                assert_eq!(ranges[units - 1].end, total);
                for pair in ranges.windows(2) {
                    assert_eq!(pair[0].end, pair[1].start, "total={} units={}", total, units);
                }
                assert_eq!(ranges.iter().map(|r| r.len()).sum::<usize>(), total);
            }
        }
    }

    #[test]
    fn test_partition_is_idempotent() {
        assert_eq!(partition_ranges(57, 4), partition_ranges(57, 4));
    }

    #[test]
    fn test_partition_small_corpus_leaves_degenerate_tail() {
        let ranges = partition_ranges(2, 4);
        assert_eq!(ranges[0], DataRange::new(0, 1));
        assert_eq!(ranges[1], DataRange::new(1, 2));
        assert!(ranges[2].is_empty());
        assert!(ranges[3].is_empty());
    }

    #[test]
    fn test_partition_without_units_is_empty() {
        assert!(partition_ranges(100, 0).is_empty());
    }

    // ============================================================
    // REGISTRY TESTS
    // ============================================================

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut registry = UnitRegistry::new(90);
        registry.upsert("a", "host-a:1");
        registry.upsert("b", "host-b:1");
        registry.upsert("c", "host-c:1");
        registry.redistribute();

        let existed = registry.upsert("b", "host-b:2");
        let assignments = registry.redistribute();

        assert!(existed);
        assert_eq!(registry.len(), 3);
        assert_eq!(assignments[1].unit_id, "b");
        assert_eq!(assignments[1].address, "host-b:2");
        assert_eq!(assignments[1].range, DataRange::new(30, 60));
        assert_eq!(registry.get("b").unwrap().status, UnitStatus::Starting);
    }

    #[test]
    fn test_every_redistribution_bumps_epoch() {
        let mut registry = UnitRegistry::new(10);
        registry.upsert("a", "host-a:1");
        let start = registry.epoch();

        let first = registry.redistribute();
        let second = registry.redistribute();

        assert_eq!(first[0].epoch, start + 1);
        assert_eq!(second[0].epoch, start + 2);
        assert_eq!(registry.assignment("a").unwrap().epoch, start + 2);
    }

    #[test]
    fn test_latency_average_and_status_tracking() {
        let mut registry = UnitRegistry::new(10);
        registry.upsert("a", "host-a:1");

        registry.mark_success("a", 10.0);
        registry.mark_success("a", 30.0);
        let unit = registry.get("a").unwrap().clone();
        assert_eq!(unit.request_count, 2);
        assert_eq!(unit.average_latency_ms, 20.0);
        assert!(unit.is_active());

        registry.mark_failure("a");
        assert!(registry.healthy().is_empty());
        assert_eq!(registry.unhealthy().len(), 1);
    }

    // ============================================================
    // TOPOLOGY TESTS
    // ============================================================

    #[tokio::test]
    async fn test_registration_redistributes_and_notifies_all_units() {
        let texts = numbered(100);
        let texts: Vec<&str> = texts.iter().map(String::as_str).collect();
        let cluster = Cluster::new(&texts, fast_config());

        let first = cluster.add_unit("u1").await;
        assert_eq!(first.assigned_range, DataRange::new(0, 100));

        cluster.add_unit("u2").await;
        let third = cluster.add_unit("u3").await;

        assert!(third.success);
        assert_eq!(third.assigned_range, DataRange::new(67, 100));
        assert_eq!(third.total_data_size, 100);
        assert_eq!(cluster.unit("u1").data_range().await, DataRange::new(0, 34));
        assert_eq!(cluster.unit("u2").data_range().await, DataRange::new(34, 67));
        assert_eq!(cluster.unit("u3").data_range().await, DataRange::new(67, 100));
        assert_eq!(cluster.coordinator.healthy_units().await.len(), 3);
    }

    #[tokio::test]
    async fn test_reregistration_is_idempotent() {
        let cluster = Cluster::new(&MOVIES, fast_config());
        cluster.add_unit("u1").await;
        cluster.add_unit("u2").await;

        let again = cluster
            .coordinator
            .register_unit("u1", "u1.local:80")
            .await
            .unwrap();

        assert_eq!(again.assigned_range, DataRange::new(0, 3));
        assert_eq!(cluster.coordinator.unit_count().await, 2);
    }

    #[tokio::test]
    async fn test_late_registration_reply_does_not_roll_back_range() {
        // ARRANGE: unit a's reply is held back while unit b registers
        let cluster = Cluster::new(&MOVIES, fast_config());
        let a = cluster.spawn_unit("a");
        let b = cluster.spawn_unit("b");
        let late_replies = DelayedReplies {
            coordinator: cluster.coordinator.clone(),
            delay: Duration::from_millis(200),
        };

        // ACT
        let registering = a.clone();
        let first = tokio::spawn(async move { registering.register(&late_replies).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        b.register(cluster.coordinator.as_ref()).await.unwrap();
        let held = first.await.unwrap().unwrap();

        // ASSERT: the pushed split wins over the stale reply
        assert_eq!(held, DataRange::new(0, 3));
        assert_eq!(a.data_range().await, DataRange::new(0, 3));
        assert_eq!(b.data_range().await, DataRange::new(3, 6));

        let response = cluster
            .coordinator
            .distributed_search("dune", &SearchOptions::default())
            .await
            .unwrap();
        let ids: Vec<&str> = response.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "4"]);
    }

    #[tokio::test]
    async fn test_blank_registration_is_rejected() {
        let cluster = Cluster::new(&MOVIES, fast_config());

        let result = cluster.coordinator.register_unit(" ", "x:1").await;

        assert!(matches!(result, Err(SearchError::InvalidRequest(_))));
        assert_eq!(cluster.coordinator.unit_count().await, 0);
    }

    #[tokio::test]
    async fn test_deregistration_lets_survivors_absorb_range() {
        let cluster = Cluster::new(&MOVIES, fast_config());
        cluster.add_unit("u1").await;
        cluster.add_unit("u2").await;
        cluster.add_unit("u3").await;

        assert!(cluster.coordinator.deregister_unit("u2").await);
        assert!(!cluster.coordinator.deregister_unit("u2").await);

        assert_eq!(cluster.unit("u1").data_range().await, DataRange::new(0, 3));
        assert_eq!(cluster.unit("u3").data_range().await, DataRange::new(3, 6));
    }

    #[tokio::test]
    async fn test_set_total_data_size_redistributes() {
        let cluster = Cluster::new(&MOVIES, fast_config());
        cluster.add_unit("u1").await;
        cluster.add_unit("u2").await;

        cluster.coordinator.set_total_data_size(4).await;

        assert_eq!(cluster.coordinator.total_data_size().await, 4);
        assert_eq!(cluster.unit("u2").data_range().await, DataRange::new(2, 4));
    }

    #[tokio::test]
    async fn test_failed_notification_marks_unit_unhealthy() {
        let cluster = Cluster::new(&MOVIES, fast_config());
        cluster.add_unit("u1").await;
        cluster.fail("u1");

        cluster.add_unit("u2").await;

        let nodes = cluster.coordinator.nodes().await;
        assert_eq!(nodes[0].status, UnitStatus::Unhealthy);
        assert_eq!(nodes[1].status, UnitStatus::Active);
        assert_eq!(nodes.len(), 2);
    }

    #[tokio::test]
    async fn test_probe_recovers_unit_and_resends_range() {
        let cluster = Cluster::new(&MOVIES, fast_config());
        cluster.add_unit("u1").await;
        cluster.fail("u1");
        cluster.add_unit("u2").await;
        assert_eq!(cluster.coordinator.probe_unhealthy().await, 0);

        cluster.heal("u1");
        let recovered = cluster.coordinator.probe_unhealthy().await;

        assert_eq!(recovered, 1);
        assert_eq!(cluster.coordinator.healthy_units().await.len(), 2);
        assert_eq!(cluster.unit("u1").data_range().await, DataRange::new(0, 3));
    }

    // ============================================================
    // FAN-OUT / MERGE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_empty_topology_fails_without_calls() {
        let cluster = Cluster::new(&MOVIES, fast_config());

        let result = cluster
            .coordinator
            .distributed_search("batman", &SearchOptions::default())
            .await;

        assert!(matches!(result, Err(SearchError::EmptyTopology)));
        assert_eq!(cluster.client.search_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_query_is_invalid() {
        let cluster = Cluster::new(&MOVIES, fast_config());
        cluster.add_unit("u1").await;

        let result = cluster
            .coordinator
            .distributed_search("   ", &SearchOptions::default())
            .await;

        assert!(matches!(result, Err(SearchError::InvalidRequest(_))));
        assert_eq!(cluster.client.search_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_contains_match_ranks_first() {
        let cluster = Cluster::new(&["Batman Begins", "The Dark Knight", "Catwoman"], fast_config());
        cluster.add_unit("u1").await;
        cluster.add_unit("u2").await;

        let response = cluster
            .coordinator
            .distributed_search("batman", &SearchOptions::default())
            .await
            .unwrap();

        assert_eq!(response.results[0].text, "Batman Begins");
        assert!(response.search_id.starts_with("search-"));
        assert!(!response.from_cache);
    }

    #[tokio::test]
    async fn test_results_tagged_with_source_unit_and_range() {
        let cluster = Cluster::new(&MOVIES, fast_config());
        cluster.add_unit("u1").await;
        cluster.add_unit("u2").await;

        let response = cluster
            .coordinator
            .distributed_search("batman", &SearchOptions::default())
            .await
            .unwrap();

        let tags: Vec<(String, Option<String>, Option<DataRange>)> = response
            .results
            .iter()
            .map(|r| (r.text.clone(), r.source_unit.clone(), r.unit_range))
            .collect();
        assert_eq!(
            tags,
            vec![
                (
                    "Batman Begins".to_string(),
                    Some("u1".to_string()),
                    Some(DataRange::new(0, 3))
                ),
                (
                    "Batman Returns".to_string(),
                    Some("u2".to_string()),
                    Some(DataRange::new(3, 6))
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_partial_failure_returns_surviving_results() {
        let cluster = Cluster::new(&MOVIES, fast_config());
        cluster.add_unit("u1").await;
        cluster.add_unit("u2").await;
        cluster.add_unit("u3").await;
        cluster.fail("u2");

        let response = cluster
            .coordinator
            .distributed_search("dune", &SearchOptions::default())
            .await
            .unwrap();

        assert_eq!(response.units_queried, 3);
        assert_eq!(response.units_successful, 2);
        assert_eq!(response.units_failed, 1);
        let failed: Vec<_> = response
            .unit_breakdown
            .iter()
            .filter(|b| !b.success)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].unit_id, "u2");
        assert!(failed[0].error.is_some());

        let texts: Vec<&str> = response.results.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["Dune Messiah"]);

        let follow_up = cluster
            .coordinator
            .distributed_search("batman", &SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(follow_up.units_queried, 2);
    }

    #[tokio::test]
    async fn test_slow_unit_times_out_alone() {
        let cluster = Cluster::new(&MOVIES, fast_config());
        cluster.add_unit("u1").await;
        cluster.add_unit("u2").await;
        cluster
            .client
            .slow
            .insert("u2.local:80".to_string(), Duration::from_millis(1_000));

        let response = cluster
            .coordinator
            .distributed_search("batman", &SearchOptions::default())
            .await
            .unwrap();

        assert_eq!(response.units_failed, 1);
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].text, "Batman Begins");
        assert!(response.total_time_ms < 1_000.0);
    }

    #[tokio::test]
    async fn test_concurrent_searches_run_side_by_side() {
        let config = CoordinatorConfig {
            search_timeout_ms: 5_000,
            ..fast_config()
        };
        let cluster = Cluster::new(&MOVIES, config);
        cluster.add_unit("u1").await;
        cluster
            .client
            .slow
            .insert("u1.local:80".to_string(), Duration::from_millis(400));
        let options = SearchOptions::default();

        let started = Instant::now();
        let (first, second) = tokio::join!(
            cluster.coordinator.distributed_search("batman", &options),
            cluster.coordinator.distributed_search("dune", &options),
        );
        let elapsed = started.elapsed();

        assert_eq!(first.unwrap().units_successful, 1);
        assert_eq!(second.unwrap().units_successful, 1);
        assert!(elapsed < Duration::from_millis(750), "searches took {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_limit_truncates_merged_results() {
        let texts = numbered(60);
        let texts: Vec<&str> = texts.iter().map(String::as_str).collect();
        let cluster = Cluster::new(&texts, fast_config());
        cluster.add_unit("u1").await;
        cluster.add_unit("u2").await;

        let limited = cluster
            .coordinator
            .distributed_search("record", &SearchOptions::with_limit(7))
            .await
            .unwrap();
        let defaulted = cluster
            .coordinator
            .distributed_search("record", &SearchOptions::default())
            .await
            .unwrap();

        assert_eq!(limited.results.len(), 7);
        assert_eq!(defaulted.results.len(), 25);
    }

    #[tokio::test]
    async fn test_second_search_served_from_cache() {
        let cluster = Cluster::new(&MOVIES, fast_config());
        cluster.add_unit("u1").await;
        cluster.add_unit("u2").await;

        let first = cluster
            .coordinator
            .distributed_search("dune", &SearchOptions::default())
            .await
            .unwrap();
        let calls = cluster.client.search_calls.load(Ordering::SeqCst);
        let second = cluster
            .coordinator
            .distributed_search("Dune", &SearchOptions::default())
            .await
            .unwrap();

        assert!(second.from_cache);
        let texts = |r: &DistributedSearchResponse| -> Vec<String> {
            r.results.iter().map(|hit| hit.text.clone()).collect()
        };
        assert_eq!(texts(&second), texts(&first));
        assert_ne!(second.search_id, first.search_id);
        assert_eq!(cluster.client.search_calls.load(Ordering::SeqCst), calls);
        assert_eq!(cluster.coordinator.aggregate_stats().await.cache_hits, 1);
    }

    #[tokio::test]
    async fn test_empty_results_are_not_cached() {
        let cluster = Cluster::new(&MOVIES, fast_config());
        cluster.add_unit("u1").await;

        cluster
            .coordinator
            .distributed_search("zzz", &SearchOptions::default())
            .await
            .unwrap();
        let again = cluster
            .coordinator
            .distributed_search("zzz", &SearchOptions::default())
            .await
            .unwrap();

        assert!(!again.from_cache);
        assert_eq!(cluster.client.search_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_data_size_change_busts_search_cache() {
        let cluster = Cluster::new(&MOVIES, fast_config());
        cluster.add_unit("u1").await;
        cluster
            .coordinator
            .distributed_search("dune", &SearchOptions::default())
            .await
            .unwrap();

        cluster.coordinator.set_total_data_size(6).await;
        let after = cluster
            .coordinator
            .distributed_search("dune", &SearchOptions::default())
            .await
            .unwrap();

        assert!(!after.from_cache);
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let config = CoordinatorConfig {
            history_size: 2,
            ..fast_config()
        };
        let cluster = Cluster::new(&MOVIES, config);
        cluster.add_unit("u1").await;

        for query in ["batman", "dune", "catwoman"] {
            cluster
                .coordinator
                .distributed_search(query, &SearchOptions::default())
                .await
                .unwrap();
        }

        let stats = cluster.coordinator.aggregate_stats().await;
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.history.len(), 2);
        assert_eq!(stats.history[0].query, "catwoman");
    }

    #[tokio::test]
    async fn test_search_tracks_hot_queries() {
        let cluster = Cluster::new(&MOVIES, fast_config());
        cluster.add_unit("u1").await;

        for _ in 0..3 {
            cluster
                .coordinator
                .distributed_search("dune", &SearchOptions::default())
                .await
                .unwrap();
        }
        cluster
            .coordinator
            .distributed_search("arrakis", &SearchOptions::default())
            .await
            .unwrap();

        let hot: Vec<String> = cluster
            .coordinator
            .cache()
            .hot_queries(2)
            .await
            .into_iter()
            .map(|h| h.query)
            .collect();
        assert_eq!(hot, vec!["dune", "arrakis"]);
    }

    // ============================================================
    // HTTP LOOPBACK TEST
    // ============================================================

    #[tokio::test]
    async fn test_http_register_and_search_round_trip() {
        // ARRANGE: a real unit server and a real coordinator server
        let datastore: Arc<dyn Datastore> = Arc::new(MemoryDatastore::from_texts(MOVIES));

        let unit_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let unit_address = unit_listener.local_addr().unwrap().to_string();
        let unit = SearchUnit::new("unit-http", unit_address.clone(), datastore, IndexKind::Token);
        let unit_shutdown = Arc::new(Notify::new());
        tokio::spawn(serve(unit.clone(), unit_listener, unit_shutdown.clone()));

        let cache = Arc::new(ResultCache::new(
            Arc::new(MemoryCacheBackend::new()),
            CacheConfig::default(),
        ));
        let coordinator = Coordinator::new(
            CoordinatorConfig::default(),
            MOVIES.len(),
            Arc::new(HttpUnitClient::new()),
            cache.clone(),
        );
        let app = router(coordinator.clone(), None, cache);
        let coordinator_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", coordinator_listener.local_addr().unwrap());
        tokio::spawn(async move {
            let _ = axum::serve(coordinator_listener, app).await;
        });

        let http = reqwest::Client::new();

        // ACT: register over HTTP, then search over HTTP
        let registered: RegisterResponse = http
            .post(format!("{}/api/register", base))
            .json(&serde_json::json!({ "id": "unit-http", "address": unit_address }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        let search: DistributedSearchResponse = http
            .post(format!("{}/api/search", base))
            .json(&SearchRequest {
                query: "batman".to_string(),
                options: SearchOptions::with_limit(10),
            })
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        let rejected = http
            .post(format!("{}/api/units", base))
            .json(&serde_json::json!({ "count": 2 }))
            .send()
            .await
            .unwrap();

        let negative = http
            .post(format!("{}/api/units", base))
            .json(&serde_json::json!({ "count": -1 }))
            .send()
            .await
            .unwrap();
        let negative_status = negative.status();
        let negative_body: ErrorResponse = negative.json().await.unwrap();

        let blank = http
            .post(format!("{}/api/search", base))
            .json(&serde_json::json!({ "query": "" }))
            .send()
            .await
            .unwrap();

        // ASSERT
        assert!(registered.success);
        assert_eq!(registered.assigned_range, DataRange::new(0, 6));
        assert_eq!(unit.data_range().await, DataRange::new(0, 6));

        let texts: Vec<&str> = search.results.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["Batman Begins", "Batman Returns"]);
        assert_eq!(search.units_successful, 1);

        assert_eq!(rejected.status(), reqwest::StatusCode::BAD_REQUEST);
        assert_eq!(blank.status(), reqwest::StatusCode::BAD_REQUEST);
        assert_eq!(negative_status, reqwest::StatusCode::BAD_REQUEST);
        assert_eq!(negative_body.error, "invalid_request");
        assert!(negative_body.message.contains("negative"));

        unit_shutdown.notify_one();
    }
}

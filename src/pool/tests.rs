//! Worker Pool Tests
//!
//! ## Test Scopes
//! - **Startup**: partitioning across workers, fallback on init timeout,
//!   failure without fallback. Timed-out builds are cancelled.
//! - **Search**: merged ranking across workers, limits, blank queries.
//! - **Maintenance**: health checks, stats and shutdown.

#[cfg(test)]
mod tests {
    use crate::config::PoolConfig;
    use crate::error::{SearchError, SearchResult};
    use crate::pool::service::WorkerPool;
    use crate::pool::types::WorkerKind;
    use crate::search::index::{BuildCancel, IndexBuilder, IndexKind, SearchableIndex, TokenIndex};
    use crate::search::types::{Record, SearchOptions};

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const STEP: Duration = Duration::from_millis(10);

    /// Token index builder that takes `delay` before finishing, checking for
    /// cancellation every few milliseconds.
    struct SlowBuilder {
        delay: Duration,
        gave_up: AtomicUsize,
    }

    fn slow_builder(delay: Duration) -> Arc<SlowBuilder> {
        Arc::new(SlowBuilder {
            delay,
            gave_up: AtomicUsize::new(0),
        })
    }

    impl IndexBuilder for SlowBuilder {
        fn kind(&self) -> IndexKind {
            IndexKind::Token
        }

        fn build(&self, texts: &[String], cancel: &BuildCancel) -> SearchResult<Box<dyn SearchableIndex>> {
            let mut waited = Duration::ZERO;
            while waited < self.delay {
                if cancel.is_cancelled() {
                    self.gave_up.fetch_add(1, Ordering::SeqCst);
                    return Err(SearchError::Index("build cancelled".to_string()));
                }
                std::thread::sleep(STEP);
                waited += STEP;
            }
            Ok(Box::new(TokenIndex::build(texts)))
        }
    }

    struct BrokenBuilder;

    impl IndexBuilder for BrokenBuilder {
        fn kind(&self) -> IndexKind {
            IndexKind::Token
        }

        fn build(&self, _texts: &[String], _cancel: &BuildCancel) -> SearchResult<Box<dyn SearchableIndex>> {
            Err(SearchError::Index("tokenizer unavailable".to_string()))
        }
    }

    fn movies() -> Vec<Record> {
        [
            "Batman Begins",
            "The Dark Knight",
            "Catwoman",
            "Dune",
            "Dune Messiah",
            "Children of Dune",
            "Arrakis Nights",
            "Batman Returns",
        ]
        .iter()
        .enumerate()
        .map(|(i, text)| Record::new(i.to_string(), *text))
        .collect()
    }

    fn config(workers: usize) -> PoolConfig {
        PoolConfig {
            worker_count: workers,
            init_timeout_ms: 1_000,
            search_timeout_ms: 1_000,
            use_fallback: true,
        }
    }

    // ============================================================
    // STARTUP TESTS
    // ============================================================

    #[tokio::test]
    async fn test_pool_partitions_records_across_workers() {
        let pool = WorkerPool::start(movies(), Arc::new(IndexKind::Token), config(3))
            .await
            .unwrap();

        let stats = pool.stats().await;
        let ranges: Vec<(usize, usize)> = stats
            .workers
            .iter()
            .map(|w| (w.data_range.start, w.data_range.end))
            .collect();

        assert_eq!(ranges, vec![(0, 3), (3, 6), (6, 8)]);
        assert_eq!(stats.primary_workers, 3);
        assert_eq!(stats.fallback_workers, 0);
    }

    #[tokio::test]
    async fn test_init_timeout_falls_back_to_scan() {
        let builder = slow_builder(Duration::from_millis(500));
        let pool_config = PoolConfig {
            init_timeout_ms: 50,
            ..config(2)
        };

        let pool = WorkerPool::start(movies(), builder, pool_config).await.unwrap();

        let stats = pool.stats().await;
        assert_eq!(stats.fallback_workers, 2);
        assert!(stats.workers.iter().all(|w| w.kind == WorkerKind::Fallback));

        let response = pool.search("dune", &SearchOptions::default()).await.unwrap();
        assert_eq!(response.results.len(), 3);
    }

    #[tokio::test]
    async fn test_init_timeout_without_fallback_fails() {
        let builder = slow_builder(Duration::from_millis(300));
        let pool_config = PoolConfig {
            init_timeout_ms: 30,
            use_fallback: false,
            ..config(2)
        };

        let result = WorkerPool::start(movies(), builder, pool_config).await;

        assert!(matches!(result, Err(SearchError::Index(_))));
    }

    #[tokio::test]
    async fn test_timed_out_build_is_cancelled() {
        let builder = slow_builder(Duration::from_secs(5));
        let pool_config = PoolConfig {
            init_timeout_ms: 50,
            ..config(2)
        };

        let pool = WorkerPool::start(movies(), builder.clone(), pool_config).await.unwrap();
        for _ in 0..100 {
            if builder.gave_up.load(Ordering::SeqCst) == 2 {
                break;
            }
            tokio::time::sleep(STEP).await;
        }

        assert_eq!(builder.gave_up.load(Ordering::SeqCst), 2);
        assert_eq!(pool.stats().await.fallback_workers, 2);
    }

    #[tokio::test]
    async fn test_build_error_does_not_fall_back() {
        let result = WorkerPool::start(movies(), Arc::new(BrokenBuilder), config(2)).await;

        match result {
            Err(SearchError::Index(message)) => assert!(message.contains("tokenizer unavailable")),
            _ => panic!("expected index error"),
        }
    }

    #[tokio::test]
    async fn test_zero_workers_rejected() {
        let result = WorkerPool::start(movies(), Arc::new(IndexKind::Scan), config(0)).await;
        assert!(matches!(result, Err(SearchError::InvalidRequest(_))));
    }

    // ============================================================
    // SEARCH TESTS
    // ============================================================

    #[tokio::test]
    async fn test_search_merges_workers_with_shared_ordering() {
        let pool = WorkerPool::start(movies(), Arc::new(IndexKind::Token), config(3))
            .await
            .unwrap();

        let response = pool.search("dune", &SearchOptions::default()).await.unwrap();

        let texts: Vec<&str> = response.results.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["Dune", "Dune Messiah", "Children of Dune"]);
        assert_eq!(response.workers_queried, 3);
        assert_eq!(response.workers_successful, 3);
    }

    #[tokio::test]
    async fn test_search_respects_limit() {
        let pool = WorkerPool::start(movies(), Arc::new(IndexKind::Scan), config(2))
            .await
            .unwrap();

        let response = pool
            .search("batman", &SearchOptions::with_limit(1))
            .await
            .unwrap();

        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].text, "Batman Begins");
    }

    #[tokio::test]
    async fn test_blank_query_is_invalid() {
        let pool = WorkerPool::start(movies(), Arc::new(IndexKind::Token), config(2))
            .await
            .unwrap();

        let result = pool.search("  ", &SearchOptions::default()).await;
        assert!(matches!(result, Err(SearchError::InvalidRequest(_))));
    }

    // ============================================================
    // MAINTENANCE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_health_check_reports_every_worker() {
        let pool = WorkerPool::start(movies(), Arc::new(IndexKind::Token), config(4))
            .await
            .unwrap();

        let health = pool.health_check().await;

        assert_eq!(health.len(), 4);
        assert!(health.iter().all(|h| h.healthy));
        assert_eq!(health.iter().map(|h| h.record_count).sum::<usize>(), 8);
    }

    #[tokio::test]
    async fn test_stats_track_searches() {
        let pool = WorkerPool::start(movies(), Arc::new(IndexKind::Token), config(2))
            .await
            .unwrap();

        pool.search("dune", &SearchOptions::default()).await.unwrap();
        pool.search("batman", &SearchOptions::default()).await.unwrap();

        let stats = pool.stats().await;
        assert_eq!(stats.total_searches, 2);
        assert!(stats.workers.iter().all(|w| w.searches == 2 && w.success_count == 2));
    }

    #[tokio::test]
    async fn test_shutdown_empties_pool() {
        let pool = WorkerPool::start(movies(), Arc::new(IndexKind::Token), config(2))
            .await
            .unwrap();

        pool.shutdown().await;

        assert_eq!(pool.worker_count().await, 0);
        let result = pool.search("dune", &SearchOptions::default()).await;
        assert!(matches!(result, Err(SearchError::EmptyTopology)));
    }
}

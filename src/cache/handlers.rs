use super::manager::{CacheHealth, CacheStats, HotQuery, ResultCache, SEARCH_PATTERN};
use crate::coordinator::protocol::{HotQueriesParams, InvalidateRequest, InvalidateResponse};

use axum::extract::Query;
use axum::{Extension, Json, http::StatusCode};
use std::sync::Arc;

const DEFAULT_HOT_LIMIT: usize = 10;

pub async fn handle_cache_health(
    Extension(cache): Extension<Arc<ResultCache>>,
) -> (StatusCode, Json<CacheHealth>) {
    let health = cache.health().await;
    let status = if health.connected || health.status == "disabled" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health))
}

pub async fn handle_cache_stats(Extension(cache): Extension<Arc<ResultCache>>) -> Json<CacheStats> {
    Json(cache.stats().await)
}

pub async fn handle_hot_queries(
    Extension(cache): Extension<Arc<ResultCache>>,
    Query(params): Query<HotQueriesParams>,
) -> Json<Vec<HotQuery>> {
    let limit = params.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_HOT_LIMIT);
    Json(cache.hot_queries(limit).await)
}

pub async fn handle_invalidate(
    Extension(cache): Extension<Arc<ResultCache>>,
    body: Option<Json<InvalidateRequest>>,
) -> (StatusCode, Json<InvalidateResponse>) {
    let pattern = body
        .and_then(|Json(req)| req.pattern)
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| SEARCH_PATTERN.to_string());

    let removed = cache.invalidate(&pattern).await;
    (
        StatusCode::OK,
        Json(InvalidateResponse {
            success: cache.is_enabled(),
            pattern,
            removed,
        }),
    )
}

use super::protocol::*;
use super::service::Coordinator;
use super::types::{AggregateStats, DistributedSearchResponse, SystemStatus, Unit};
use crate::cache::handlers::{
    handle_cache_health, handle_cache_stats, handle_hot_queries, handle_invalidate,
};
use crate::cache::manager::ResultCache;
use crate::error::{ErrorResponse, SearchError};
use crate::lifecycle::manager::LifecycleManager;
use crate::lifecycle::types::LifecycleStatus;

use axum::routing::{get, post};
use axum::{Extension, Json, Router, http::StatusCode};
use std::sync::Arc;

type ErrorReply = (StatusCode, Json<ErrorResponse>);

fn error_reply(e: &SearchError) -> ErrorReply {
    (e.status_code(), Json(ErrorResponse::from(e)))
}

pub async fn handle_register(
    Extension(coordinator): Extension<Arc<Coordinator>>,
    Json(req): Json<RegisterRequest>,
) -> (StatusCode, Json<RegisterResponse>) {
    match coordinator.register_unit(&req.id, &req.address).await {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(e) => {
            tracing::error!("Registration of {} failed: {}", req.id, e);
            (
                e.status_code(),
                Json(RegisterResponse {
                    success: false,
                    unit_id: req.id,
                    assigned_range: Default::default(),
                    total_data_size: coordinator.total_data_size().await,
                    epoch: 0,
                    message: Some(e.to_string()),
                }),
            )
        }
    }
}

pub async fn handle_deregister(
    Extension(coordinator): Extension<Arc<Coordinator>>,
    Json(req): Json<DeregisterRequest>,
) -> (StatusCode, Json<DeregisterResponse>) {
    coordinator.deregister_unit(&req.id).await;
    (StatusCode::OK, Json(DeregisterResponse { success: true }))
}

pub async fn handle_search(
    Extension(coordinator): Extension<Arc<Coordinator>>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<DistributedSearchResponse>, ErrorReply> {
    coordinator
        .distributed_search(&req.query, &req.options)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::warn!("Search {:?} failed: {}", req.query, e);
            error_reply(&e)
        })
}

pub async fn handle_status(Extension(coordinator): Extension<Arc<Coordinator>>) -> Json<SystemStatus> {
    Json(coordinator.status().await)
}

pub async fn handle_stats(Extension(coordinator): Extension<Arc<Coordinator>>) -> Json<AggregateStats> {
    Json(coordinator.cached_aggregate_stats().await)
}

pub async fn handle_nodes(Extension(coordinator): Extension<Arc<Coordinator>>) -> Json<Vec<Unit>> {
    Json(coordinator.nodes().await)
}

pub async fn handle_health(
    Extension(coordinator): Extension<Arc<Coordinator>>,
) -> Json<CoordinatorHealthResponse> {
    let topology = coordinator.topology().await;
    Json(CoordinatorHealthResponse {
        status: "healthy".to_string(),
        unit_count: topology.unit_count,
        healthy_units: topology.healthy_units,
        total_data_size: topology.total_data_size,
    })
}

pub async fn handle_set_unit_count(
    Extension(lifecycle): Extension<Option<Arc<LifecycleManager>>>,
    Json(req): Json<SetUnitCountRequest>,
) -> Result<Json<SetUnitCountResponse>, ErrorReply> {
    let count = usize::try_from(req.count).map_err(|_| {
        error_reply(&SearchError::invalid(format!(
            "Unit count {} must not be negative",
            req.count
        )))
    })?;

    let Some(lifecycle) = lifecycle else {
        return Err(error_reply(&SearchError::invalid(
            "Unit lifecycle management is not enabled",
        )));
    };

    let report = lifecycle.reconcile(count).await.map_err(|e| {
        tracing::warn!("Rejected unit count {}: {}", req.count, e);
        error_reply(&e)
    })?;

    Ok(Json(SetUnitCountResponse {
        success: report.success,
        current_count: report.current_count,
        target_count: report.target_count,
        failures: report.failures,
    }))
}

pub async fn handle_unit_status(
    Extension(lifecycle): Extension<Option<Arc<LifecycleManager>>>,
) -> Result<Json<LifecycleStatus>, ErrorReply> {
    match lifecycle {
        Some(lifecycle) => Ok(Json(lifecycle.status().await)),
        None => Err(error_reply(&SearchError::invalid(
            "Unit lifecycle management is not enabled",
        ))),
    }
}

pub async fn handle_set_data_size(
    Extension(coordinator): Extension<Arc<Coordinator>>,
    Json(req): Json<DataSizeRequest>,
) -> Json<DataSizeResponse> {
    let unit_count = coordinator.set_total_data_size(req.total_data_size).await;
    Json(DataSizeResponse {
        success: true,
        total_data_size: req.total_data_size,
        unit_count,
    })
}

pub fn router(
    coordinator: Arc<Coordinator>,
    lifecycle: Option<Arc<LifecycleManager>>,
    cache: Arc<ResultCache>,
) -> Router {
    Router::new()
        .route(ENDPOINT_REGISTER, post(handle_register))
        .route(ENDPOINT_DEREGISTER, post(handle_deregister))
        .route(ENDPOINT_SEARCH, post(handle_search))
        .route(ENDPOINT_STATUS, get(handle_status))
        .route(ENDPOINT_STATS, get(handle_stats))
        .route(ENDPOINT_NODES, get(handle_nodes))
        .route(ENDPOINT_HEALTH, get(handle_health))
        .route(ENDPOINT_UNITS, get(handle_unit_status).post(handle_set_unit_count))
        .route(ENDPOINT_DATA_SIZE, post(handle_set_data_size))
        .route(ENDPOINT_CACHE_HEALTH, get(handle_cache_health))
        .route(ENDPOINT_CACHE_STATS, get(handle_cache_stats))
        .route(ENDPOINT_CACHE_HOT, get(handle_hot_queries))
        .route(ENDPOINT_CACHE_INVALIDATE, post(handle_invalidate))
        .layer(Extension(coordinator))
        .layer(Extension(lifecycle))
        .layer(Extension(cache))
}

use super::protocol::*;
use super::service::SearchUnit;
use super::types::UnitStats;

use axum::routing::{get, post};
use axum::{Extension, Json, Router, http::StatusCode};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;

pub async fn handle_update_range(
    Extension(unit): Extension<Arc<SearchUnit>>,
    Json(req): Json<UpdateRangeRequest>,
) -> (StatusCode, Json<UpdateRangeResponse>) {
    match unit
        .update_range(req.data_range, req.total_data_size, req.epoch)
        .await {
        Ok(item_count) => (
            StatusCode::OK,
            Json(UpdateRangeResponse {
                success: true,
                unit_id: unit.id.clone(),
                item_count,
                message: Some(format!("Data range updated to {}", req.data_range)),
            }),
        ),
        Err(e) => {
            tracing::error!("Unit {} failed to update data range: {}", unit.id, e);
            (
                e.status_code(),
                Json(UpdateRangeResponse {
                    success: false,
                    unit_id: unit.id.clone(),
                    item_count: 0,
                    message: Some(e.to_string()),
                }),
            )
        }
    }
}

pub async fn handle_search(
    Extension(unit): Extension<Arc<SearchUnit>>,
    Json(req): Json<UnitSearchRequest>,
) -> (StatusCode, Json<UnitSearchResponse>) {
    if let Some(search_id) = &req.search_id {
        tracing::debug!("Unit {} serving search {}", unit.id, search_id);
    }

    let response = unit.search(&req.query, &req.options).await;
    (StatusCode::OK, Json(response))
}

pub async fn handle_health(
    Extension(unit): Extension<Arc<SearchUnit>>,
) -> (StatusCode, Json<UnitHealthResponse>) {
    (StatusCode::OK, Json(unit.health()))
}

pub async fn handle_stats(Extension(unit): Extension<Arc<SearchUnit>>) -> Json<UnitStats> {
    Json(unit.stats().await)
}

pub async fn handle_shutdown(
    Extension(unit): Extension<Arc<SearchUnit>>,
    Extension(shutdown): Extension<Arc<Notify>>,
) -> StatusCode {
    tracing::info!("Unit {} received shutdown request", unit.id);
    shutdown.notify_one();
    StatusCode::ACCEPTED
}

pub fn router(unit: Arc<SearchUnit>, shutdown: Arc<Notify>) -> Router {
    Router::new()
        .route(ENDPOINT_UPDATE_RANGE, post(handle_update_range))
        .route(ENDPOINT_SEARCH, post(handle_search))
        .route(ENDPOINT_HEALTH, get(handle_health))
        .route(ENDPOINT_STATS, get(handle_stats))
        .route(ENDPOINT_SHUTDOWN, post(handle_shutdown))
        .layer(Extension(unit))
        .layer(Extension(shutdown))
}

/// Serves `unit` on `listener` until `shutdown` is notified.
pub async fn serve(
    unit: Arc<SearchUnit>,
    listener: TcpListener,
    shutdown: Arc<Notify>,
) -> anyhow::Result<()> {
    let app = router(unit, shutdown.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.notified().await })
        .await?;
    Ok(())
}

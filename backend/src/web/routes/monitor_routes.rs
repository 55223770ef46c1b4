use axum::{extract::State, routing::post, Json, Router};
use std::sync::Arc;
use tracing::info;

use crate::services::monitor_service;
use crate::web::models::{
    BatchResponse, DeleteByFilterRequest, DeleteMonitorsRequest, MonitorListRequest,
    MonitorListResponse, MonitorView,
};
use crate::web::{AppError, AppState};

async fn get_monitors_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<MonitorListRequest>,
) -> Result<Json<MonitorListResponse>, AppError> {
    let mut api = app_state.open_session(&payload.credentials).await?;
    let listed = monitor_service::list_monitors(api.as_mut()).await;
    api.disconnect().await;

    let monitors: Vec<MonitorView> = listed
        .map_err(|e| AppError::remote("Failed to get monitors", e))?
        .into_iter()
        .map(MonitorView::from)
        .collect();

    Ok(Json(MonitorListResponse {
        success: true,
        total: monitors.len(),
        monitors,
    }))
}

async fn delete_monitors_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<DeleteMonitorsRequest>,
) -> Result<Json<BatchResponse>, AppError> {
    let ids = payload
        .monitor_ids
        .filter(|ids| !ids.is_empty())
        .ok_or_else(AppError::missing_parameters)?;

    let mut api = app_state.open_session(&payload.credentials).await?;
    let results = monitor_service::delete_monitors(api.as_mut(), &ids).await;
    api.disconnect().await;

    let message = format!(
        "Delete completed! Success: {}, Failed: {}",
        results.success, results.failed
    );
    info!("{message}");
    Ok(Json(BatchResponse {
        success: true,
        results,
        message,
    }))
}

async fn delete_by_filter_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<DeleteByFilterRequest>,
) -> Result<Json<BatchResponse>, AppError> {
    let filters = payload.filters.unwrap_or_default();

    let mut api = app_state.open_session(&payload.credentials).await?;
    let outcome = monitor_service::delete_by_filter(api.as_mut(), &filters).await;
    api.disconnect().await;

    let results = outcome.map_err(|e| AppError::remote("Error during deletion", e))?;
    let message = format!(
        "Found {} matching monitors, delete completed! Success: {}, Failed: {}",
        results.matched_count.unwrap_or_default(),
        results.success,
        results.failed
    );
    info!("{message}");
    Ok(Json(BatchResponse {
        success: true,
        results,
        message,
    }))
}

pub fn create_monitor_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/get-monitors", post(get_monitors_handler))
        .route("/delete-monitors", post(delete_monitors_handler))
        .route("/delete-by-filter", post(delete_by_filter_handler))
}

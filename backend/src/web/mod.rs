use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::kuma::{Connector, Credentials, MonitorApi};
use crate::server::config::ServerConfig;
use crate::services::UploadStore;
use crate::web::{error::AppError, routes::*};

pub mod error;
pub mod models;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub connector: Arc<dyn Connector>,
    pub uploads: UploadStore,
}

impl AppState {
    pub fn new(config: Arc<ServerConfig>, connector: Arc<dyn Connector>) -> Self {
        let uploads = UploadStore::new(&config.upload_dir);
        Self {
            config,
            connector,
            uploads,
        }
    }

    /// Validates the operator's credentials and logs in to the monitoring
    /// server. The caller owns the session and must disconnect it.
    pub async fn open_session(
        &self,
        credentials: &Credentials,
    ) -> Result<Box<dyn MonitorApi>, AppError> {
        let credentials = credentials
            .normalized()
            .ok_or_else(AppError::missing_parameters)?;
        self.connector.connect(&credentials).await.map_err(|e| {
            warn!(kuma_url = %credentials.kuma_url, error = %e, "Could not open monitoring session");
            AppError::from(e)
        })
    }
}

async fn health_check_handler() -> &'static str {
    "OK"
}

pub fn create_axum_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);
    let body_limit = app_state.config.max_upload_bytes;

    Router::new()
        .route("/api/health", get(health_check_handler))
        .merge(monitor_routes::create_monitor_router())
        .merge(import_routes::create_import_router())
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

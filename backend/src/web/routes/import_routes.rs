use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::import::{read_table, run_import};
use crate::services::UploadGuard;
use crate::web::models::{BatchResponse, ImportRequest, UploadResponse};
use crate::web::{AppError, AppState};

async fn upload_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Invalid multipart field: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidInput(format!("Invalid multipart field: {e}")))?;
        upload = Some((file_name, bytes));
        break;
    }
    let (file_name, bytes) =
        upload.ok_or_else(|| AppError::InvalidInput("No file selected".to_string()))?;

    let filename = app_state.uploads.save(&file_name, &bytes).await?;
    let path = app_state.uploads.dir().join(&filename);
    let table = match read_table(&path).await {
        Ok(table) => table,
        Err(e) => {
            warn!(file = %filename, error = %e, "Uploaded file is not a readable CSV");
            drop(UploadGuard::new(path));
            return Err(e.into());
        }
    };
    info!(file = %filename, rows = table.total_rows(), columns = table.columns.len(), "Stored upload");

    Ok(Json(UploadResponse {
        success: true,
        preview: table.preview(app_state.config.preview_rows).to_vec(),
        total_rows: table.total_rows(),
        columns: table.columns,
        filename,
    }))
}

async fn import_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<ImportRequest>,
) -> Result<Json<BatchResponse>, AppError> {
    let filename = payload
        .filename
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(AppError::missing_parameters)?;
    if payload.credentials.normalized().is_none() {
        return Err(AppError::missing_parameters());
    }
    let path = app_state.uploads.locate(&filename).await?;

    let mut api = app_state.open_session(&payload.credentials).await?;
    let guard = UploadGuard::new(path);

    let table = match read_table(guard.path()).await {
        Ok(table) => table,
        Err(e) => {
            api.disconnect().await;
            return Err(e.into());
        }
    };
    info!(file = %filename, rows = table.total_rows(), "Starting import");
    let results = run_import(api.as_mut(), &table).await;
    api.disconnect().await;
    drop(guard);

    let message = format!(
        "Import completed! Success: {}, Failed: {}",
        results.success, results.failed
    );
    info!("{message}");
    Ok(Json(BatchResponse {
        success: true,
        results,
        message,
    }))
}

pub fn create_import_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/upload", post(upload_handler))
        .route("/import", post(import_handler))
}

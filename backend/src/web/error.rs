use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::import::ParseError;
use crate::kuma::KumaError;
use crate::services::UploadError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("API connection failed: {0}")]
    ApiConnection(String),
    #[error("Failed to read CSV file: {0}")]
    Parse(String),
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl AppError {
    pub fn missing_parameters() -> Self {
        AppError::InvalidInput("Missing required parameters".to_string())
    }

    /// Wraps an error from the monitoring server that happened after the
    /// session was established.
    pub fn remote(context: &str, err: KumaError) -> Self {
        AppError::InternalServerError(format!("{context}: {err}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::ApiConnection(msg) => (
                StatusCode::BAD_REQUEST,
                format!("API connection failed: {msg}"),
            ),
            AppError::Parse(msg) => (
                StatusCode::BAD_REQUEST,
                format!("Failed to read CSV file: {msg}"),
            ),
            AppError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({ "error": error_message }))).into_response()
    }
}

/// Connecting and logging in are the only remote failures that reach this
/// conversion; later ones go through [`AppError::remote`].
impl From<KumaError> for AppError {
    fn from(err: KumaError) -> Self {
        AppError::ApiConnection(err.to_string())
    }
}

impl From<ParseError> for AppError {
    fn from(err: ParseError) -> Self {
        AppError::Parse(err.to_string())
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Io(e) => AppError::InternalServerError(format!("Failed to store upload: {e}")),
            other => AppError::InvalidInput(other.to_string()),
        }
    }
}

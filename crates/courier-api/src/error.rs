//! API error types and HTTP mappings.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use courier_db::DbError;
use courier_queue::QueueError;

/// Errors surfaced by the ingress API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource does not exist.
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// Store failure. The caller sees 502: the request may be retried with
    /// the same idempotency key.
    #[error("database error: {0}")]
    Db(#[from] DbError),

    /// Queue failure on the enqueue step.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            ApiError::Validation(_) => {
                (StatusCode::BAD_REQUEST, "validation_error", self.to_string())
            }
            ApiError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
            ApiError::Db(e) => {
                tracing::error!(error = %e, "Store error");
                (
                    StatusCode::BAD_GATEWAY,
                    "upstream_error",
                    "store unavailable".to_string(),
                )
            }
            ApiError::Queue(e) => {
                tracing::error!(error = %e, "Queue error");
                (
                    StatusCode::BAD_GATEWAY,
                    "upstream_error",
                    "queue unavailable".to_string(),
                )
            }
        };

        let body = json!({
            "error": error_type,
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}

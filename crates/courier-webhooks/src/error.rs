//! Reconciler error types and their HTTP mappings.
//!
//! The status codes are part of the provider contract: 503 asks the
//! provider to redeliver the callback later (transient), 500 does not.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use courier_db::DbError;
use courier_queue::QueueError;

/// Errors from callback handling and event processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Request body was not a parseable form.
    #[error("bad form")]
    BadForm,

    /// Signature missing or did not verify.
    #[error("invalid signature")]
    InvalidSignature,

    /// Bounded DB deadline elapsed; the provider should redeliver.
    #[error("dependency deadline exceeded")]
    DeadlineExceeded,

    /// No message row matches the provider message id yet (the worker has
    /// not persisted it); redelivery will resolve it.
    #[error("message not found for provider message id")]
    MessageNotFound,

    /// Store failure that is not a deadline.
    #[error("database error: {0}")]
    Db(#[from] DbError),

    /// Internal event queue publish failed.
    #[error("event enqueue failed: {0}")]
    Enqueue(#[from] QueueError),

    /// Queue mode selected but no event queue wired in.
    #[error("event queue not configured")]
    QueueNotConfigured,

    /// Unexpected internal failure (e.g. a panicked persistence task).
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            WebhookError::BadForm => (StatusCode::BAD_REQUEST, "bad_form"),
            WebhookError::InvalidSignature => (StatusCode::UNAUTHORIZED, "invalid_signature"),
            WebhookError::DeadlineExceeded => (StatusCode::SERVICE_UNAVAILABLE, "dependency"),
            WebhookError::MessageNotFound => (StatusCode::SERVICE_UNAVAILABLE, "dependency"),
            WebhookError::Enqueue(e) => {
                tracing::error!(error = %e, "Webhook event enqueue failed");
                (StatusCode::SERVICE_UNAVAILABLE, "dependency")
            }
            WebhookError::Db(e) => {
                tracing::error!(error = %e, "Webhook store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "dependency")
            }
            WebhookError::QueueNotConfigured => {
                (StatusCode::INTERNAL_SERVER_ERROR, "dependency")
            }
            WebhookError::Internal(message) => {
                tracing::error!(error = %message, "Webhook internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };

        let body = json!({
            "error": error_type,
            "message": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mappings() {
        assert_eq!(
            WebhookError::BadForm.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebhookError::InvalidSignature.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            WebhookError::DeadlineExceeded.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            WebhookError::MessageNotFound.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            WebhookError::QueueNotConfigured.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

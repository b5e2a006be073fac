//! Router wiring for the ingress API.

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::messages;
use crate::metrics::{track_requests, ApiMetrics};
use crate::services::admission::AdmissionService;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub admission: Arc<AdmissionService>,
    pub metrics: Arc<ApiMetrics>,
}

/// Build the ingress API router.
pub fn api_routes(state: ApiState) -> Router {
    let metrics = Arc::clone(&state.metrics);

    Router::new()
        .route("/v1/sms/messages", post(messages::create_message))
        .route("/v1/messages/:id", get(messages::get_message))
        .layer(middleware::from_fn_with_state(metrics, track_requests))
        .with_state(state)
}

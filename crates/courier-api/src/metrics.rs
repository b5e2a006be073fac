//! API metrics and the shared metrics exposition endpoint.

use std::sync::{Arc, Mutex};

use axum::extract::{MatchedPath, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

/// Labels for HTTP request metrics.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RequestLabels {
    pub endpoint: String,
    pub status: u16,
}

/// Labels carrying a single result/reason string.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ResultLabels {
    pub result: String,
}

/// Metric families owned by the ingress API.
#[derive(Debug)]
pub struct ApiMetrics {
    /// API requests, labeled by route pattern and response status.
    pub requests_total: Family<RequestLabels, Counter>,
    /// Queue publish outcomes.
    pub enqueue_total: Family<ResultLabels, Counter>,
    /// Policy suppressions, labeled by reason.
    pub suppressed_total: Family<ResultLabels, Counter>,
}

impl ApiMetrics {
    /// Create the metric families and register them.
    pub fn register(registry: &mut Registry) -> Self {
        let metrics = Self::unregistered();

        registry.register(
            "courier_api_requests",
            "API requests",
            metrics.requests_total.clone(),
        );
        registry.register(
            "courier_enqueue",
            "Queue publish outcomes",
            metrics.enqueue_total.clone(),
        );
        registry.register(
            "courier_suppressed",
            "Messages suppressed by policy",
            metrics.suppressed_total.clone(),
        );

        metrics
    }

    /// Create families without registering them (tests).
    #[must_use]
    pub fn unregistered() -> Self {
        Self {
            requests_total: Family::default(),
            enqueue_total: Family::default(),
            suppressed_total: Family::default(),
        }
    }

    pub fn record_request(&self, endpoint: &str, status: u16) {
        self.requests_total
            .get_or_create(&RequestLabels {
                endpoint: endpoint.to_string(),
                status,
            })
            .inc();
    }

    pub fn record_enqueue(&self, result: &str) {
        self.enqueue_total
            .get_or_create(&ResultLabels {
                result: result.to_string(),
            })
            .inc();
    }

    pub fn record_suppressed(&self, reason: &str) {
        self.suppressed_total
            .get_or_create(&ResultLabels {
                result: reason.to_string(),
            })
            .inc();
    }
}

/// Middleware recording a request counter per (route pattern, status).
pub async fn track_requests(
    State(metrics): State<Arc<ApiMetrics>>,
    matched_path: Option<MatchedPath>,
    request: Request,
    next: Next,
) -> Response {
    let endpoint = matched_path
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;
    metrics.record_request(&endpoint, response.status().as_u16());
    response
}

/// Router exposing the registry in the OpenMetrics text format. Served on
/// the dedicated metrics port by every binary.
pub fn metrics_routes(registry: Arc<Mutex<Registry>>) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let registry = Arc::clone(&registry);
            async move {
                let mut body = String::new();
                let encode_result = {
                    let registry = registry
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner);
                    prometheus_client::encoding::text::encode(&mut body, &registry)
                };

                match encode_result {
                    Ok(()) => (
                        [(
                            CONTENT_TYPE,
                            "application/openmetrics-text; version=1.0.0; charset=utf-8",
                        )],
                        body,
                    )
                        .into_response(),
                    Err(e) => {
                        tracing::error!(error = %e, "Metrics encoding failed");
                        axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
                    }
                }
            }
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment() {
        let metrics = ApiMetrics::unregistered();
        metrics.record_request("/v1/sms/messages", 202);
        metrics.record_request("/v1/sms/messages", 202);
        metrics.record_enqueue("ok");
        metrics.record_suppressed("cap_exceeded");

        let labels = RequestLabels {
            endpoint: "/v1/sms/messages".into(),
            status: 202,
        };
        assert_eq!(metrics.requests_total.get_or_create(&labels).get(), 2);
    }
}

//! Liveness and readiness endpoints.
//!
//! `/healthz` is a static liveness probe. `/readyz` runs the registered
//! dependency checks (DB ping, broker reachability) under a shared
//! deadline; any failure answers 503 so the scheduler stops routing
//! traffic without restarting the process.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;

use courier_db::DbPool;
use courier_queue::Broker;

/// A named readiness check.
#[async_trait]
pub trait ReadyCheck: Send + Sync {
    fn name(&self) -> &'static str;
    async fn check(&self) -> Result<(), String>;
}

/// Readiness check that pings the database.
pub struct DbReadyCheck(pub DbPool);

#[async_trait]
impl ReadyCheck for DbReadyCheck {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn check(&self) -> Result<(), String> {
        self.0.ping().await.map_err(|e| e.to_string())
    }
}

/// Readiness check that probes the queue broker.
pub struct BrokerReadyCheck(pub Arc<dyn Broker>);

#[async_trait]
impl ReadyCheck for BrokerReadyCheck {
    fn name(&self) -> &'static str {
        "broker"
    }

    async fn check(&self) -> Result<(), String> {
        self.0.healthcheck().await.map_err(|e| e.to_string())
    }
}

#[derive(Clone)]
struct HealthState {
    checks: Arc<Vec<Box<dyn ReadyCheck>>>,
    timeout: Duration,
}

/// Build the health router with the given readiness checks.
pub fn health_routes(checks: Vec<Box<dyn ReadyCheck>>, timeout: Duration) -> Router {
    let state = HealthState {
        checks: Arc::new(checks),
        timeout,
    };

    Router::new()
        .route("/healthz", get(|| async { StatusCode::OK }))
        .route("/readyz", get(readyz))
        .with_state(state)
}

async fn readyz(State(state): State<HealthState>) -> StatusCode {
    let run_all = async {
        for check in state.checks.iter() {
            if let Err(e) = check.check().await {
                tracing::warn!(check = check.name(), error = %e, "Readiness check failed");
                return StatusCode::SERVICE_UNAVAILABLE;
            }
        }
        StatusCode::OK
    };

    match tokio::time::timeout(state.timeout, run_all).await {
        Ok(status) => status,
        Err(_) => {
            tracing::warn!("Readiness checks timed out");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    struct AlwaysOk;

    #[async_trait]
    impl ReadyCheck for AlwaysOk {
        fn name(&self) -> &'static str {
            "ok"
        }
        async fn check(&self) -> Result<(), String> {
            Ok(())
        }
    }

    struct AlwaysFailing;

    #[async_trait]
    impl ReadyCheck for AlwaysFailing {
        fn name(&self) -> &'static str {
            "failing"
        }
        async fn check(&self) -> Result<(), String> {
            Err("down".to_string())
        }
    }

    struct Hanging;

    #[async_trait]
    impl ReadyCheck for Hanging {
        fn name(&self) -> &'static str {
            "hanging"
        }
        async fn check(&self) -> Result<(), String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    async fn probe(router: Router, path: &str) -> StatusCode {
        router
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_healthz_is_static_ok() {
        let router = health_routes(vec![Box::new(AlwaysFailing)], Duration::from_secs(2));
        assert_eq!(probe(router, "/healthz").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readyz_ok_when_all_checks_pass() {
        let router = health_routes(vec![Box::new(AlwaysOk)], Duration::from_secs(2));
        assert_eq!(probe(router, "/readyz").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readyz_fails_when_any_check_fails() {
        let router = health_routes(
            vec![Box::new(AlwaysOk), Box::new(AlwaysFailing)],
            Duration::from_secs(2),
        );
        assert_eq!(probe(router, "/readyz").await, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_readyz_times_out_hanging_checks() {
        let router = health_routes(vec![Box::new(Hanging)], Duration::from_millis(20));
        assert_eq!(probe(router, "/readyz").await, StatusCode::SERVICE_UNAVAILABLE);
    }
}

//! Courier ingress API server.
//!
//! Accepts send requests, runs the admission policy chain, and hands
//! accepted work to the dispatch queue. Serves the app and health routes
//! on `PORT` and the metrics exposition on `METRICS_PORT`.

mod config;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use prometheus_client::registry::Registry;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use courier_api::health::{health_routes, BrokerReadyCheck, DbReadyCheck};
use courier_api::metrics::metrics_routes;
use courier_api::{api_routes, AdmissionService, ApiMetrics, ApiState, PgAdmissionStore};
use courier_core::logging::init_logging;
use courier_db::{run_migrations, DbPool};
use courier_queue::{Broker, JobProducer, SqsBroker};

use config::ApiServerConfig;

#[tokio::main]
async fn main() {
    let config = match ApiServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {e}");
            std::process::exit(1);
        }
    };
    init_logging(&config.log_filter);

    let pool = match DbPool::connect_with_options(&config.database_url, config.db_pool.clone())
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "Database connect failed");
            std::process::exit(1);
        }
    };
    if let Err(e) = run_migrations(&pool).await {
        tracing::error!(error = %e, "Migrations failed");
        std::process::exit(1);
    }

    let sqs_client =
        SqsBroker::build_client(&config.aws_region, config.sqs_endpoint_url.as_deref()).await;
    let broker: Arc<dyn Broker> =
        Arc::new(SqsBroker::new(sqs_client, config.sqs_queue_url.clone()));

    let mut registry = Registry::default();
    let metrics = Arc::new(ApiMetrics::register(&mut registry));
    let registry = Arc::new(Mutex::new(registry));

    let admission = Arc::new(AdmissionService::new(
        Arc::new(PgAdmissionStore::new(pool.clone())),
        Arc::new(JobProducer::new(Arc::clone(&broker), config.group_buckets)),
        Arc::clone(&metrics),
        config.max_sms_per_day,
    ));

    let app = api_routes(ApiState { admission, metrics }).merge(health_routes(
        vec![
            Box::new(DbReadyCheck(pool.clone())),
            Box::new(BrokerReadyCheck(Arc::clone(&broker))),
        ],
        Duration::from_secs(2),
    ));
    let metrics_app = metrics_routes(registry);

    let shutdown = CancellationToken::new();

    let app_server = spawn_server(config.port, app, shutdown.clone()).await;
    let metrics_server = spawn_server(config.metrics_port, metrics_app, shutdown.clone()).await;
    tracing::info!(port = config.port, metrics_port = config.metrics_port, "API server started");

    shutdown_signal().await;
    tracing::info!("Shutdown requested");
    shutdown.cancel();

    if tokio::time::timeout(Duration::from_secs(10), async {
        let _ = app_server.await;
        let _ = metrics_server.await;
    })
    .await
    .is_err()
    {
        tracing::warn!("Shutdown timed out waiting for servers to drain");
    }
    pool.close().await;
}

async fn spawn_server(
    port: u16,
    app: axum::Router,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let listener = match TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(port, error = %e, "Bind failed");
            std::process::exit(1);
        }
    };

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
        {
            tracing::error!(error = %e, "Server error");
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

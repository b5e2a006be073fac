//! Courier dispatch worker.
//!
//! Consumes dispatch jobs from the queue with a fixed worker pool and
//! sends them through Twilio under a token-bucket limiter and a circuit
//! breaker. Serves health probes on `PORT` and metrics on `METRICS_PORT`.

mod config;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use prometheus_client::registry::Registry;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use courier_api::health::{health_routes, BrokerReadyCheck, DbReadyCheck};
use courier_api::metrics::metrics_routes;
use courier_core::logging::init_logging;
use courier_db::DbPool;
use courier_dispatch::{
    BreakerConfig, CircuitBreaker, DispatchMetrics, PgDispatchStore, Processor, ProcessorConfig,
    TokenBucket,
};
use courier_provider::{TwilioClient, TwilioClientConfig};
use courier_queue::{Broker, ConsumerPool, HandlerError, Job, SqsBroker};

use config::WorkerConfig;

#[tokio::main]
async fn main() {
    let config = match WorkerConfig::from_env() {
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

    let sqs_client =
        SqsBroker::build_client(&config.aws_region, config.sqs_endpoint_url.as_deref()).await;
    let broker: Arc<dyn Broker> =
        Arc::new(SqsBroker::new(sqs_client, config.sqs_queue_url.clone()));

    // Refuse to start against unreachable dependencies.
    match tokio::time::timeout(Duration::from_secs(3), pool.ping()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Database not reachable");
            std::process::exit(1);
        }
        Err(_) => {
            tracing::error!("Database ping timed out");
            std::process::exit(1);
        }
    }
    match tokio::time::timeout(Duration::from_secs(3), broker.healthcheck()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Queue broker not reachable");
            std::process::exit(1);
        }
        Err(_) => {
            tracing::error!("Queue broker probe timed out");
            std::process::exit(1);
        }
    }

    let mut registry = Registry::default();
    let metrics = Arc::new(DispatchMetrics::register(&mut registry));
    let registry = Arc::new(Mutex::new(registry));

    let sender = match TwilioClient::new(TwilioClientConfig {
        account_sid: config.twilio_account_sid.clone(),
        auth_token: config.twilio_auth_token.clone(),
        messaging_service_sid: config.twilio_messaging_service_sid.clone(),
        from_number: config.twilio_from_number.clone(),
        base_url: config.twilio_base_url.clone(),
        request_timeout: Duration::from_secs(8),
    }) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "Twilio client init failed");
            std::process::exit(1);
        }
    };

    let processor = Arc::new(Processor::new(
        Arc::new(PgDispatchStore::new(pool.clone())),
        Arc::new(sender),
        TokenBucket::new(config.rate_limit),
        CircuitBreaker::new(BreakerConfig::default()),
        metrics,
        ProcessorConfig {
            templates: config.templates.clone(),
            claim_stale_after: config.claim_stale_after,
            status_callback_url: config.status_callback_url.clone(),
            ..ProcessorConfig::default()
        },
    ));

    let shutdown = CancellationToken::new();

    let health_app = health_routes(
        vec![
            Box::new(DbReadyCheck(pool.clone())),
            Box::new(BrokerReadyCheck(Arc::clone(&broker))),
        ],
        Duration::from_secs(2),
    );
    let health_server = spawn_server(config.port, health_app, shutdown.clone()).await;
    let metrics_server =
        spawn_server(config.metrics_port, metrics_routes(registry), shutdown.clone()).await;

    let consumer = ConsumerPool::new(Arc::clone(&broker), config.consumer, shutdown.clone());
    let handler_processor = Arc::clone(&processor);
    let poll_task = tokio::spawn(consumer.run::<Job, _, _>(move |job: Job| {
        let processor = Arc::clone(&handler_processor);
        async move {
            processor
                .process(&job)
                .await
                .map_err(|e| Box::new(e) as HandlerError)
        }
    }));
    tracing::info!(
        queue_url = %config.sqs_queue_url,
        concurrency = config.consumer.concurrency,
        "Worker polling started"
    );

    shutdown_signal().await;
    tracing::info!("Shutdown requested");
    shutdown.cancel();

    if tokio::time::timeout(Duration::from_secs(10), async {
        let _ = poll_task.await;
        let _ = health_server.await;
        let _ = metrics_server.await;
    })
    .await
    .is_err()
    {
        tracing::warn!("Shutdown timed out waiting for in-flight jobs");
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

//! Courier internal callback-event processor.
//!
//! Consumes callback events the webhook ingress deferred to the internal
//! queue and applies terminal delivery states to messages. Handler errors
//! are not acked; the broker redelivers until the worker has persisted the
//! provider message id.

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
use courier_queue::{Broker, CallbackEvent, ConsumerPool, HandlerError, SqsBroker};
use courier_webhooks::{EventProcessor, PgReconcilerStore, WebhookMetrics};

use config::EventsConfig;

#[tokio::main]
async fn main() {
    let config = match EventsConfig::from_env() {
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
    let broker: Arc<dyn Broker> = Arc::new(SqsBroker::new(
        sqs_client,
        config.callback_events_queue_url.clone(),
    ));

    let mut registry = Registry::default();
    let metrics = Arc::new(WebhookMetrics::register(&mut registry));
    let registry = Arc::new(Mutex::new(registry));

    let processor = Arc::new(EventProcessor::new(
        Arc::new(PgReconcilerStore::new(pool.clone())),
        metrics,
        Duration::from_secs(5),
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
    let poll_task = tokio::spawn(consumer.run::<CallbackEvent, _, _>(move |event: CallbackEvent| {
        let processor = Arc::clone(&handler_processor);
        async move {
            processor
                .handle(event)
                .await
                .map_err(|e| Box::new(e) as HandlerError)
        }
    }));
    tracing::info!(
        queue_url = %config.callback_events_queue_url,
        concurrency = config.consumer.concurrency,
        "Event processor polling started"
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
        tracing::warn!("Shutdown timed out waiting for in-flight events");
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

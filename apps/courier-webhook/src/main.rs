//! Courier provider callback reconciler.
//!
//! Verifies Twilio status callbacks and applies terminal delivery states,
//! either inline (sync mode) or by handing events to the internal queue
//! (queue mode).

mod config;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use prometheus_client::registry::Registry;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use courier_api::health::{health_routes, BrokerReadyCheck, DbReadyCheck, ReadyCheck};
use courier_api::metrics::metrics_routes;
use courier_core::logging::init_logging;
use courier_db::DbPool;
use courier_queue::{Broker, CallbackEventProducer, CallbackEventPublisher, SqsBroker};
use courier_webhooks::{
    webhook_routes, PgReconcilerStore, ReconcilerConfig, WebhookMetrics, WebhookMode, WebhookState,
};

use config::WebhookServerConfig;

#[tokio::main]
async fn main() {
    let config = match WebhookServerConfig::from_env() {
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

    // Queue mode publishes callback events instead of writing inline.
    let mut event_broker: Option<Arc<dyn Broker>> = None;
    let mut events: Option<Arc<dyn CallbackEventPublisher>> = None;
    if config.mode == WebhookMode::Queue {
        let region = config.aws_region.as_deref().unwrap_or_default();
        let sqs_client =
            SqsBroker::build_client(region, config.sqs_endpoint_url.as_deref()).await;
        let queue_url = config
            .callback_events_queue_url
            .clone()
            .unwrap_or_default();
        let broker: Arc<dyn Broker> = Arc::new(SqsBroker::new(sqs_client, queue_url));
        events = Some(Arc::new(CallbackEventProducer::new(Arc::clone(&broker))));
        event_broker = Some(broker);
    }

    let mut registry = Registry::default();
    let metrics = Arc::new(WebhookMetrics::register(&mut registry));
    let registry = Arc::new(Mutex::new(registry));

    let state = WebhookState {
        store: Arc::new(PgReconcilerStore::new(pool.clone())),
        events,
        config: Arc::new(ReconcilerConfig {
            auth_token: config.twilio_auth_token.clone(),
            public_url: config.public_webhook_url.clone(),
            mode: config.mode,
            ..ReconcilerConfig::default()
        }),
        metrics,
    };

    let mut checks: Vec<Box<dyn ReadyCheck>> = vec![Box::new(DbReadyCheck(pool.clone()))];
    if let Some(broker) = event_broker {
        checks.push(Box::new(BrokerReadyCheck(broker)));
    }

    let app = webhook_routes(state).merge(health_routes(checks, Duration::from_secs(2)));
    let metrics_app = metrics_routes(registry);

    let shutdown = CancellationToken::new();
    let app_server = spawn_server(config.port, app, shutdown.clone()).await;
    let metrics_server = spawn_server(config.metrics_port, metrics_app, shutdown.clone()).await;
    tracing::info!(
        port = config.port,
        mode = ?config.mode,
        "Webhook server started"
    );

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

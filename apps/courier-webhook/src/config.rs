//! Environment configuration for the callback reconciler.

use std::time::Duration;

use courier_core::config::{env_or, env_parse, optional_env, require_env, ConfigError};
use courier_db::DbPoolOptions;
use courier_webhooks::WebhookMode;

/// Configuration for the webhook process.
#[derive(Debug, Clone)]
pub struct WebhookServerConfig {
    pub database_url: String,
    pub port: u16,
    pub metrics_port: u16,
    pub log_filter: String,

    pub twilio_auth_token: String,
    /// Must match the exact URL registered with Twilio; it is part of the
    /// signed canonical string.
    pub public_webhook_url: String,
    pub mode: WebhookMode,

    /// Internal event queue; required in queue mode.
    pub aws_region: Option<String>,
    pub callback_events_queue_url: Option<String>,
    pub sqs_endpoint_url: Option<String>,

    pub db_pool: DbPoolOptions,
}

impl WebhookServerConfig {
    /// Load from environment variables, failing fast on anything invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mode_raw = env_or("WEBHOOK_MODE", "sync");
        let mode = WebhookMode::parse(&mode_raw).ok_or_else(|| ConfigError::InvalidValue {
            var: "WEBHOOK_MODE",
            message: format!("expected 'sync' or 'queue', got '{mode_raw}'"),
        })?;

        let aws_region = optional_env("AWS_REGION");
        let callback_events_queue_url = optional_env("CALLBACK_EVENTS_QUEUE_URL");
        if mode == WebhookMode::Queue {
            if aws_region.is_none() {
                return Err(ConfigError::MissingVar("AWS_REGION"));
            }
            if callback_events_queue_url.is_none() {
                return Err(ConfigError::MissingVar("CALLBACK_EVENTS_QUEUE_URL"));
            }
        }

        Ok(Self {
            database_url: require_env("DATABASE_URL")?,
            port: env_parse("PORT", 8080)?,
            metrics_port: env_parse("METRICS_PORT", 9090)?,
            log_filter: env_or("LOG_FILTER", "info"),
            twilio_auth_token: require_env("TWILIO_AUTH_TOKEN")?,
            public_webhook_url: require_env("PUBLIC_WEBHOOK_URL")?,
            mode,
            aws_region,
            callback_events_queue_url,
            sqs_endpoint_url: optional_env("SQS_ENDPOINT_URL"),
            db_pool: db_pool_from_env()?,
        })
    }
}

fn db_pool_from_env() -> Result<DbPoolOptions, ConfigError> {
    Ok(DbPoolOptions {
        min_connections: env_parse("DB_POOL_MIN_CONNS", 1)?,
        max_connections: env_parse("DB_POOL_MAX_CONNS", 10)?,
        acquire_timeout: Duration::from_secs(env_parse("DB_POOL_ACQUIRE_TIMEOUT_SECS", 5)?),
    })
}

//! Environment configuration for the callback-event processor.

use std::time::Duration;

use courier_core::config::{env_or, env_parse, optional_env, require_env, ConfigError};
use courier_db::DbPoolOptions;
use courier_queue::{ConsumerOptions, ReceiveOptions};

/// Configuration for the event processor process.
#[derive(Debug, Clone)]
pub struct EventsConfig {
    pub database_url: String,
    pub port: u16,
    pub metrics_port: u16,
    pub log_filter: String,

    pub aws_region: String,
    pub callback_events_queue_url: String,
    pub sqs_endpoint_url: Option<String>,
    pub consumer: ConsumerOptions,

    pub db_pool: DbPoolOptions,
}

impl EventsConfig {
    /// Load from environment variables, failing fast on anything invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: require_env("DATABASE_URL")?,
            port: env_parse("PORT", 8080)?,
            metrics_port: env_parse("METRICS_PORT", 9090)?,
            log_filter: env_or("LOG_FILTER", "info"),
            aws_region: require_env("AWS_REGION")?,
            callback_events_queue_url: require_env("CALLBACK_EVENTS_QUEUE_URL")?,
            sqs_endpoint_url: optional_env("SQS_ENDPOINT_URL"),
            consumer: ConsumerOptions {
                receive: ReceiveOptions {
                    max_messages: env_parse("SQS_MAX_MESSAGES", 10)?,
                    wait_time_seconds: env_parse("SQS_WAIT_TIME_SECS", 20)?,
                    visibility_timeout_seconds: env_parse("SQS_VISIBILITY_TIMEOUT_SECS", 60)?,
                },
                concurrency: env_parse("PROCESSOR_CONCURRENCY", 20)?,
            },
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

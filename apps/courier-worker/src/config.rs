//! Environment configuration for the dispatch worker.

use std::collections::HashMap;
use std::time::Duration;

use courier_core::config::{env_or, env_parse, optional_env, require_env, ConfigError};
use courier_db::DbPoolOptions;
use courier_dispatch::RateLimitConfig;
use courier_queue::{ConsumerOptions, ReceiveOptions};

/// Default template catalog when `TEMPLATES_JSON` is unset.
const DEFAULT_TEMPLATES: &str =
    r#"{"txn_confirm_v1":"Hi {name}, your request is confirmed. Ref: {ref}. Thanks."}"#;

/// Configuration for the worker process.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub port: u16,
    pub metrics_port: u16,
    pub log_filter: String,

    pub aws_region: String,
    pub sqs_queue_url: String,
    pub sqs_endpoint_url: Option<String>,
    pub consumer: ConsumerOptions,

    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_messaging_service_sid: Option<String>,
    pub twilio_from_number: Option<String>,
    pub twilio_base_url: String,
    pub rate_limit: RateLimitConfig,

    pub claim_stale_after: chrono::Duration,
    pub status_callback_url: Option<String>,
    /// Template id → body.
    pub templates: HashMap<String, String>,

    pub db_pool: DbPoolOptions,
}

impl WorkerConfig {
    /// Load from environment variables, failing fast on anything invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let templates_json = env_or("TEMPLATES_JSON", DEFAULT_TEMPLATES);
        let templates: HashMap<String, String> =
            serde_json::from_str(&templates_json).map_err(|e| ConfigError::InvalidValue {
                var: "TEMPLATES_JSON",
                message: e.to_string(),
            })?;

        Ok(Self {
            database_url: require_env("DATABASE_URL")?,
            port: env_parse("PORT", 8080)?,
            metrics_port: env_parse("METRICS_PORT", 9090)?,
            log_filter: env_or("LOG_FILTER", "info"),
            aws_region: require_env("AWS_REGION")?,
            sqs_queue_url: require_env("SQS_QUEUE_URL")?,
            sqs_endpoint_url: optional_env("SQS_ENDPOINT_URL"),
            consumer: ConsumerOptions {
                receive: ReceiveOptions {
                    max_messages: env_parse("SQS_MAX_MESSAGES", 10)?,
                    wait_time_seconds: env_parse("SQS_WAIT_TIME_SECS", 20)?,
                    visibility_timeout_seconds: env_parse("SQS_VISIBILITY_TIMEOUT_SECS", 60)?,
                },
                concurrency: env_parse("WORKER_CONCURRENCY", 20)?,
            },
            twilio_account_sid: require_env("TWILIO_ACCOUNT_SID")?,
            twilio_auth_token: require_env("TWILIO_AUTH_TOKEN")?,
            twilio_messaging_service_sid: optional_env("TWILIO_MESSAGING_SERVICE_SID"),
            twilio_from_number: optional_env("TWILIO_FROM_NUMBER"),
            twilio_base_url: env_or("TWILIO_BASE_URL", "https://api.twilio.com"),
            rate_limit: RateLimitConfig {
                requests_per_second: env_parse("TWILIO_RPS_PER_POD", 5.0)?,
                burst: env_parse("TWILIO_BURST", 10)?,
            },
            claim_stale_after: chrono::Duration::seconds(env_parse(
                "CLAIM_STALE_AFTER_SECS",
                120,
            )?),
            status_callback_url: optional_env("STATUS_CALLBACK_URL"),
            templates,
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

//! Environment configuration for the ingress API server.

use std::time::Duration;

use courier_core::config::{env_or, env_parse, optional_env, require_env, ConfigError};
use courier_db::DbPoolOptions;

/// Configuration for the API server process.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub database_url: String,
    pub port: u16,
    pub metrics_port: u16,
    pub log_filter: String,

    /// Per-destination daily send cap.
    pub max_sms_per_day: i32,

    pub aws_region: String,
    pub sqs_queue_url: String,
    /// Endpoint override for LocalStack-style deployments.
    pub sqs_endpoint_url: Option<String>,
    /// FIFO group buckets per tenant.
    pub group_buckets: u32,

    pub db_pool: DbPoolOptions,
}

impl ApiServerConfig {
    /// Load from environment variables, failing fast on anything invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: require_env("DATABASE_URL")?,
            port: env_parse("PORT", 8080)?,
            metrics_port: env_parse("METRICS_PORT", 9090)?,
            log_filter: env_or("LOG_FILTER", "info"),
            max_sms_per_day: env_parse("MAX_SMS_PER_DAY", 2)?,
            aws_region: require_env("AWS_REGION")?,
            sqs_queue_url: require_env("SQS_QUEUE_URL")?,
            sqs_endpoint_url: optional_env("SQS_ENDPOINT_URL"),
            group_buckets: env_parse("GROUP_BUCKETS", 2000)?,
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

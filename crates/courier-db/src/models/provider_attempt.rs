//! `ProviderAttempt` model: append-only log of provider calls.

use serde_json::Value;
use sqlx::PgPool;

use crate::error::DbError;

/// One row per provider call attempt, successful or not.
#[derive(Debug, Clone)]
pub struct ProviderAttempt;

/// Fields for appending a provider attempt.
#[derive(Debug, Clone)]
pub struct NewProviderAttempt {
    pub message_id: String,
    pub provider: String,
    pub provider_msg_id: Option<String>,
    pub http_status: i32,
    pub error_code: Option<String>,
    pub error_msg: Option<String>,
    pub request_json: Value,
    pub response_json: Value,
}

impl ProviderAttempt {
    /// Append an attempt row.
    pub async fn insert(pool: &PgPool, new: &NewProviderAttempt) -> Result<(), DbError> {
        sqlx::query(
            r"
            INSERT INTO provider_attempts (
                message_id, provider, provider_msg_id, http_status,
                error_code, error_msg, request_json, response_json
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(&new.message_id)
        .bind(&new.provider)
        .bind(&new.provider_msg_id)
        .bind(new.http_status)
        .bind(&new.error_code)
        .bind(&new.error_msg)
        .bind(&new.request_json)
        .bind(&new.response_json)
        .execute(pool)
        .await?;

        Ok(())
    }
}

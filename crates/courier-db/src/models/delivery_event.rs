//! `DeliveryEvent` model: append-only log of provider status callbacks.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::error::DbError;

/// One row per received provider callback (or internal replay of one).
#[derive(Debug, Clone)]
pub struct DeliveryEvent;

/// Fields for appending a delivery event.
#[derive(Debug, Clone)]
pub struct NewDeliveryEvent {
    pub provider: String,
    pub provider_msg_id: String,
    pub vendor_status: String,
    pub error_code: Option<String>,
    /// Raw callback payload; omitted on the internal-queue path to keep
    /// event messages small.
    pub payload: Option<Value>,
    pub occurred_at: Option<DateTime<Utc>>,
}

impl DeliveryEvent {
    /// Append a delivery event row.
    pub async fn insert(pool: &PgPool, new: &NewDeliveryEvent) -> Result<(), DbError> {
        sqlx::query(
            r"
            INSERT INTO delivery_events (
                provider, provider_msg_id, vendor_status, error_code,
                payload_json, occurred_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(&new.provider)
        .bind(&new.provider_msg_id)
        .bind(&new.vendor_status)
        .bind(&new.error_code)
        .bind(&new.payload)
        .bind(new.occurred_at)
        .execute(pool)
        .await?;

        Ok(())
    }
}

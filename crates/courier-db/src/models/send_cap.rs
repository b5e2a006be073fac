//! `SendCap` model: per-destination daily send quota.
//!
//! The increment is check-after-increment inside a single transaction: the
//! upsert returns the post-increment count, and an over-cap increment is
//! compensated with a decrement before the transaction commits. Two
//! concurrent near-cap requests therefore serialize on the row lock and
//! cannot both pass, nor can an over-cap attempt burn allowance.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::error::DbError;

/// Outcome of a daily-cap increment.
#[derive(Debug, Clone, Copy)]
pub struct CapDecision {
    /// Whether the send is within the cap.
    pub allowed: bool,
    /// The counter value after this decision (rolled back if denied).
    pub count: i32,
}

/// Daily send counter keyed by (tenant, destination, UTC day).
#[derive(Debug, Clone)]
pub struct SendCap;

impl SendCap {
    /// Atomically increment the counter for `now`'s UTC day and check it
    /// against `max_per_day`.
    pub async fn increment_daily(
        pool: &PgPool,
        tenant_id: &str,
        phone: &str,
        now: DateTime<Utc>,
        max_per_day: i32,
    ) -> Result<CapDecision, DbError> {
        let day = now.date_naive();
        let mut tx = pool.begin().await?;

        let row = sqlx::query(
            r"
            INSERT INTO send_caps_daily (tenant_id, phone, day, count, updated_at)
            VALUES ($1, $2, $3, 1, now())
            ON CONFLICT (tenant_id, phone, day)
            DO UPDATE SET count = send_caps_daily.count + 1, updated_at = now()
            RETURNING count
            ",
        )
        .bind(tenant_id)
        .bind(phone)
        .bind(day)
        .fetch_one(&mut *tx)
        .await?;

        let count: i32 = row.get("count");

        if count > max_per_day {
            sqlx::query(
                r"
                UPDATE send_caps_daily SET count = count - 1, updated_at = now()
                WHERE tenant_id = $1 AND phone = $2 AND day = $3
                ",
            )
            .bind(tenant_id)
            .bind(phone)
            .bind(day)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            return Ok(CapDecision {
                allowed: false,
                count: count - 1,
            });
        }

        tx.commit().await?;
        Ok(CapDecision {
            allowed: true,
            count,
        })
    }
}

//! `ConsentRecord` model: per-destination channel opt-in state.

use sqlx::PgPool;

use crate::error::DbError;

/// A tenant's consent record for a destination and channel.
///
/// Absence of a record counts as opted out: the admission path requires an
/// explicit opt-in before dispatching marketing or transactional SMS.
#[derive(Debug, Clone)]
pub struct ConsentRecord;

impl ConsentRecord {
    /// Whether the destination has explicitly opted in to SMS.
    pub async fn is_opted_in(
        pool: &PgPool,
        tenant_id: &str,
        phone: &str,
    ) -> Result<bool, DbError> {
        let status: Option<(String,)> = sqlx::query_as(
            r"
            SELECT status FROM consents
            WHERE tenant_id = $1 AND phone = $2 AND channel = 'sms'
            ",
        )
        .bind(tenant_id)
        .bind(phone)
        .fetch_optional(pool)
        .await?;

        Ok(matches!(status, Some((s,)) if s == "opted_in"))
    }
}

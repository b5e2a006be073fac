//! `SuppressionEntry` model: tenant-scoped do-not-send list.

use sqlx::PgPool;

use crate::error::DbError;

/// Presence of a row suppresses all sends to the destination.
#[derive(Debug, Clone)]
pub struct SuppressionEntry;

impl SuppressionEntry {
    /// Whether the destination is on the tenant's suppression list.
    pub async fn is_suppressed(
        pool: &PgPool,
        tenant_id: &str,
        phone: &str,
    ) -> Result<bool, DbError> {
        let result: (bool,) = sqlx::query_as(
            r"
            SELECT EXISTS(
                SELECT 1 FROM suppression_list
                WHERE tenant_id = $1 AND phone = $2
            )
            ",
        )
        .bind(tenant_id)
        .bind(phone)
        .fetch_one(pool)
        .await?;

        Ok(result.0)
    }
}

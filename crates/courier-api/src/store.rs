//! The slice of the store the admission path needs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use courier_core::MessageState;
use courier_db::models::{
    CapDecision, ConsentRecord, IdempotencyResult, Message, NewMessage, SendCap, SuppressionEntry,
};
use courier_db::{DbError, DbPool};

/// Store operations used by the admission policy engine and message reads.
#[async_trait]
pub trait AdmissionStore: Send + Sync {
    async fn find_by_idempotency(
        &self,
        tenant_id: &str,
        idempotency_key: &str,
    ) -> Result<Option<IdempotencyResult>, DbError>;

    /// Insert a `queued` message row; fails with a unique violation when a
    /// concurrent create won the race.
    async fn insert_message(&self, new: &NewMessage, now: DateTime<Utc>) -> Result<(), DbError>;

    async fn mark_state(
        &self,
        id: &str,
        state: MessageState,
        last_error: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), DbError>;

    async fn get_message(&self, id: &str) -> Result<Option<Message>, DbError>;

    async fn is_suppressed(&self, tenant_id: &str, phone: &str) -> Result<bool, DbError>;

    async fn is_opted_in(&self, tenant_id: &str, phone: &str) -> Result<bool, DbError>;

    /// Transactional increment-then-check of the daily cap.
    async fn increment_daily_cap(
        &self,
        tenant_id: &str,
        phone: &str,
        now: DateTime<Utc>,
        max_per_day: i32,
    ) -> Result<CapDecision, DbError>;
}

/// `PostgreSQL`-backed admission store.
#[derive(Clone)]
pub struct PgAdmissionStore {
    pool: DbPool,
}

impl PgAdmissionStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdmissionStore for PgAdmissionStore {
    async fn find_by_idempotency(
        &self,
        tenant_id: &str,
        idempotency_key: &str,
    ) -> Result<Option<IdempotencyResult>, DbError> {
        Message::find_by_idempotency(self.pool.inner(), tenant_id, idempotency_key).await
    }

    async fn insert_message(&self, new: &NewMessage, now: DateTime<Utc>) -> Result<(), DbError> {
        Message::insert(self.pool.inner(), new, now).await
    }

    async fn mark_state(
        &self,
        id: &str,
        state: MessageState,
        last_error: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        Message::mark_state(self.pool.inner(), id, state, last_error, now).await
    }

    async fn get_message(&self, id: &str) -> Result<Option<Message>, DbError> {
        Message::get(self.pool.inner(), id).await
    }

    async fn is_suppressed(&self, tenant_id: &str, phone: &str) -> Result<bool, DbError> {
        SuppressionEntry::is_suppressed(self.pool.inner(), tenant_id, phone).await
    }

    async fn is_opted_in(&self, tenant_id: &str, phone: &str) -> Result<bool, DbError> {
        ConsentRecord::is_opted_in(self.pool.inner(), tenant_id, phone).await
    }

    async fn increment_daily_cap(
        &self,
        tenant_id: &str,
        phone: &str,
        now: DateTime<Utc>,
        max_per_day: i32,
    ) -> Result<CapDecision, DbError> {
        SendCap::increment_daily(self.pool.inner(), tenant_id, phone, now, max_per_day).await
    }
}

//! The slice of the store the dispatch worker needs.
//!
//! Narrowing the surface to five calls keeps the processor testable
//! against an in-memory fake and makes the ownership rules visible: the
//! worker claims, records attempts, persists provider details, and marks
//! terminal failures — nothing else.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use courier_core::MessageState;
use courier_db::models::{Message, MessageForWorker, NewProviderAttempt, ProviderAttempt};
use courier_db::{DbError, DbPool};

/// Store operations used while processing a dispatch job.
#[async_trait]
pub trait DispatchStore: Send + Sync {
    async fn get_for_worker(&self, id: &str) -> Result<Option<MessageForWorker>, DbError>;

    /// Conditionally claim the message for processing. `false` means
    /// another worker owns it.
    async fn claim(
        &self,
        id: &str,
        now: DateTime<Utc>,
        stale_after: Duration,
    ) -> Result<bool, DbError>;

    async fn insert_attempt(&self, attempt: &NewProviderAttempt) -> Result<(), DbError>;

    async fn set_provider_details(
        &self,
        id: &str,
        provider: &str,
        provider_msg_id: &str,
        state: MessageState,
        now: DateTime<Utc>,
    ) -> Result<(), DbError>;

    async fn mark_state(
        &self,
        id: &str,
        state: MessageState,
        last_error: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), DbError>;
}

/// `PostgreSQL`-backed dispatch store.
#[derive(Clone)]
pub struct PgDispatchStore {
    pool: DbPool,
}

impl PgDispatchStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DispatchStore for PgDispatchStore {
    async fn get_for_worker(&self, id: &str) -> Result<Option<MessageForWorker>, DbError> {
        Message::get_for_worker(self.pool.inner(), id).await
    }

    async fn claim(
        &self,
        id: &str,
        now: DateTime<Utc>,
        stale_after: Duration,
    ) -> Result<bool, DbError> {
        Message::claim(self.pool.inner(), id, now, stale_after).await
    }

    async fn insert_attempt(&self, attempt: &NewProviderAttempt) -> Result<(), DbError> {
        ProviderAttempt::insert(self.pool.inner(), attempt).await
    }

    async fn set_provider_details(
        &self,
        id: &str,
        provider: &str,
        provider_msg_id: &str,
        state: MessageState,
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        Message::set_provider_details(self.pool.inner(), id, provider, provider_msg_id, state, now)
            .await
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
}

//! The slice of the store the reconciler needs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use courier_core::MessageState;
use courier_db::models::{DeliveryEvent, Message, NewDeliveryEvent};
use courier_db::{DbError, DbPool};

/// Store operations used when applying a provider callback.
#[async_trait]
pub trait ReconcilerStore: Send + Sync {
    async fn insert_delivery_event(&self, event: &NewDeliveryEvent) -> Result<(), DbError>;

    /// Conditionally apply a terminal state by (provider, provider message
    /// id). `false` means no matching updatable row exists yet.
    async fn update_by_provider_msg_id(
        &self,
        provider: &str,
        provider_msg_id: &str,
        new_state: MessageState,
        last_error: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, DbError>;
}

/// `PostgreSQL`-backed reconciler store.
#[derive(Clone)]
pub struct PgReconcilerStore {
    pool: DbPool,
}

impl PgReconcilerStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReconcilerStore for PgReconcilerStore {
    async fn insert_delivery_event(&self, event: &NewDeliveryEvent) -> Result<(), DbError> {
        DeliveryEvent::insert(self.pool.inner(), event).await
    }

    async fn update_by_provider_msg_id(
        &self,
        provider: &str,
        provider_msg_id: &str,
        new_state: MessageState,
        last_error: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        Message::update_by_provider_msg_id(
            self.pool.inner(),
            provider,
            provider_msg_id,
            new_state,
            last_error,
            now,
        )
        .await
    }
}

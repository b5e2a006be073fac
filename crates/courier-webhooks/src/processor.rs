//! Internal callback-event processor.
//!
//! Mirrors the sync-mode terminal path without the HTTP surface. Errors
//! propagate to the consumer pool, which leaves the event un-acked; the
//! broker redelivers it once the worker has persisted the provider message
//! id.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::instrument;

use courier_db::models::NewDeliveryEvent;
use courier_queue::CallbackEvent;

use crate::error::WebhookError;
use crate::metrics::WebhookMetrics;
use crate::store::ReconcilerStore;
use crate::terminal_state_for;

/// Applies queued callback events to message state.
pub struct EventProcessor {
    store: Arc<dyn ReconcilerStore>,
    metrics: Arc<WebhookMetrics>,
    /// Per-event deadline on all DB work.
    db_deadline: Duration,
}

impl EventProcessor {
    pub fn new(
        store: Arc<dyn ReconcilerStore>,
        metrics: Arc<WebhookMetrics>,
        db_deadline: Duration,
    ) -> Self {
        Self {
            store,
            metrics,
            db_deadline,
        }
    }

    /// Process one callback event.
    ///
    /// Appends the delivery event (payload omitted on this path), then for
    /// terminal statuses applies the conditional update. A zero-row update
    /// is an error so the broker redelivers later.
    #[instrument(skip_all, fields(provider_msg_id = %event.provider_msg_id, status = %event.status))]
    pub async fn handle(&self, event: CallbackEvent) -> Result<(), WebhookError> {
        self.metrics.record_event(&event.status);

        let work = async {
            self.store
                .insert_delivery_event(&NewDeliveryEvent {
                    provider: event.provider.clone(),
                    provider_msg_id: event.provider_msg_id.clone(),
                    vendor_status: event.status.clone(),
                    error_code: event.error_code.clone(),
                    payload: None,
                    occurred_at: None,
                })
                .await?;

            let Some(new_state) = terminal_state_for(&event.status) else {
                return Ok(());
            };

            let updated = self
                .store
                .update_by_provider_msg_id(
                    &event.provider,
                    &event.provider_msg_id,
                    new_state,
                    event.error_code.as_deref(),
                    Utc::now(),
                )
                .await?;

            if !updated {
                // The worker has not persisted the provider message id yet.
                self.metrics.record_update_not_found(&event.status);
                return Err(WebhookError::MessageNotFound);
            }

            Ok(())
        };

        match tokio::time::timeout(self.db_deadline, work).await {
            Err(_) => Err(WebhookError::DeadlineExceeded),
            Ok(result) => result,
        }
    }
}

//! Admission policy engine.
//!
//! `create_and_enqueue` runs a strictly ordered decision chain; each step
//! short-circuits the rest:
//!
//! 1. idempotency lookup (no side effects on a hit)
//! 2. insert the `queued` row (unique violation falls back to the lookup)
//! 3. suppression list
//! 4. consent (absence counts as not opted in)
//! 5. daily cap (transactional increment with in-transaction rollback)
//! 6. queue publish
//!
//! Policy rejections are not errors: the caller receives a normal response
//! with `state = suppressed`. Only store and queue failures propagate.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;

use courier_core::render::normalize_destination;
use courier_core::{MessageId, MessageState};
use courier_db::models::NewMessage;
use courier_queue::{Job, JobPublisher};

use crate::error::ApiError;
use crate::metrics::ApiMetrics;
use crate::store::AdmissionStore;

/// A validated send request, destination not yet normalized.
#[derive(Debug, Clone)]
pub struct SmsRequest {
    pub tenant_id: String,
    pub idempotency_key: String,
    pub to: String,
    pub template_id: String,
    pub vars: HashMap<String, String>,
    pub campaign_id: Option<String>,
}

/// Outcome of an admission decision.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOutcome {
    pub message_id: String,
    pub state: MessageState,
}

/// The admission policy engine.
pub struct AdmissionService {
    store: Arc<dyn AdmissionStore>,
    publisher: Arc<dyn JobPublisher>,
    metrics: Arc<ApiMetrics>,
    max_per_day: i32,
}

impl AdmissionService {
    pub fn new(
        store: Arc<dyn AdmissionStore>,
        publisher: Arc<dyn JobPublisher>,
        metrics: Arc<ApiMetrics>,
        max_per_day: i32,
    ) -> Self {
        Self {
            store,
            publisher,
            metrics,
            max_per_day,
        }
    }

    /// Create a message row and hand it to the dispatch queue.
    #[instrument(skip_all, fields(tenant_id = %request.tenant_id, message_id = %message_id))]
    pub async fn create_and_enqueue(
        &self,
        request: SmsRequest,
        message_id: MessageId,
        now: DateTime<Utc>,
    ) -> Result<CreateOutcome, ApiError> {
        let to = normalize_destination(&request.to);

        // 1) Idempotency: a prior create wins outright.
        if let Some(existing) = self
            .store
            .find_by_idempotency(&request.tenant_id, &request.idempotency_key)
            .await?
        {
            return Ok(CreateOutcome {
                message_id: existing.message_id,
                state: existing.state,
            });
        }

        // 2) Create the row. A unique violation means a concurrent
        // duplicate got there first; fall back to its row.
        let new = NewMessage {
            id: message_id.to_string(),
            tenant_id: request.tenant_id.clone(),
            idempotency_key: request.idempotency_key.clone(),
            to: to.clone(),
            template_id: request.template_id.clone(),
            vars: request.vars.clone(),
            campaign_id: request.campaign_id.clone(),
        };
        if let Err(e) = self.store.insert_message(&new, now).await {
            if e.is_unique_violation() {
                if let Some(existing) = self
                    .store
                    .find_by_idempotency(&request.tenant_id, &request.idempotency_key)
                    .await?
                {
                    return Ok(CreateOutcome {
                        message_id: existing.message_id,
                        state: existing.state,
                    });
                }
            }
            return Err(e.into());
        }

        // 3) Suppression list.
        if self.store.is_suppressed(&request.tenant_id, &to).await? {
            return self.suppress(&message_id, "suppressed", now).await;
        }

        // 4) Consent: explicit opt-in required.
        if !self.store.is_opted_in(&request.tenant_id, &to).await? {
            return self.suppress(&message_id, "not_opted_in", now).await;
        }

        // 5) Daily cap.
        let cap = self
            .store
            .increment_daily_cap(&request.tenant_id, &to, now, self.max_per_day)
            .await?;
        if !cap.allowed {
            return self.suppress(&message_id, "cap_exceeded", now).await;
        }

        // 6) Hand off to the queue.
        let job = Job {
            tenant_id: request.tenant_id,
            message_id: message_id.to_string(),
            idempotency_key: request.idempotency_key,
            to,
            template_id: request.template_id,
            vars: request.vars,
            campaign_id: request.campaign_id,
        };
        if let Err(e) = self.publisher.enqueue(&job).await {
            self.metrics.record_enqueue("error");
            // Best effort: surface the queue failure even if the mark fails.
            if let Err(mark_err) = self
                .store
                .mark_state(
                    message_id.as_str(),
                    MessageState::Failed,
                    Some("enqueue_failed"),
                    now,
                )
                .await
            {
                tracing::error!(error = %mark_err, "Failed to mark enqueue failure");
            }
            return Err(e.into());
        }
        self.metrics.record_enqueue("ok");

        Ok(CreateOutcome {
            message_id: message_id.to_string(),
            state: MessageState::Queued,
        })
    }

    /// Fetch a message for the read endpoint.
    pub async fn get_message(
        &self,
        id: &str,
    ) -> Result<Option<courier_db::models::Message>, ApiError> {
        Ok(self.store.get_message(id).await?)
    }

    async fn suppress(
        &self,
        message_id: &MessageId,
        reason: &'static str,
        now: DateTime<Utc>,
    ) -> Result<CreateOutcome, ApiError> {
        self.metrics.record_suppressed(reason);
        self.store
            .mark_state(
                message_id.as_str(),
                MessageState::Suppressed,
                Some(reason),
                now,
            )
            .await?;

        Ok(CreateOutcome {
            message_id: message_id.to_string(),
            state: MessageState::Suppressed,
        })
    }
}

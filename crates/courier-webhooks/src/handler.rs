//! HTTP ingress for Twilio status callbacks.
//!
//! Two persistence modes, selected at deploy time:
//!
//! - **sync**: persist the delivery event and apply terminal states inline,
//!   bounded by a DB deadline that is detached from the client connection
//!   (providers disconnect mid-write; the write must land anyway).
//! - **queue**: after the signature check, hand a small `CallbackEvent` to
//!   the internal event queue and answer immediately. This keeps callbacks
//!   fast and shields the database during webhook floods.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use chrono::Utc;

use courier_db::models::NewDeliveryEvent;
use courier_db::DbError;
use courier_provider::{verify_signature, PROVIDER_NAME};
use courier_queue::{CallbackEvent, CallbackEventPublisher};

use crate::error::WebhookError;
use crate::metrics::WebhookMetrics;
use crate::store::ReconcilerStore;
use crate::terminal_state_for;

/// Persistence mode for the callback ingress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookMode {
    /// Apply DB writes inline with bounded retries.
    Sync,
    /// Enqueue a `CallbackEvent` for the event processor.
    Queue,
}

impl WebhookMode {
    /// Parse a configuration string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sync" => Some(Self::Sync),
            "queue" => Some(Self::Queue),
            _ => None,
        }
    }
}

/// Reconciler tuning.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Twilio auth token used for signature verification.
    pub auth_token: String,
    /// The exact public URL Twilio signs callbacks against.
    pub public_url: String,
    pub mode: WebhookMode,
    /// Overall deadline for sync-mode DB work.
    pub db_deadline: Duration,
    /// Deadline for the queue-mode enqueue.
    pub enqueue_deadline: Duration,
    /// Attempts to find the message row for a terminal callback.
    pub update_retries: u32,
    /// Linear backoff step between update attempts.
    pub update_retry_step: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            auth_token: String::new(),
            public_url: String::new(),
            mode: WebhookMode::Sync,
            db_deadline: Duration::from_secs(5),
            enqueue_deadline: Duration::from_secs(2),
            update_retries: 10,
            update_retry_step: Duration::from_millis(25),
        }
    }
}

/// Shared state for the callback handler.
#[derive(Clone)]
pub struct WebhookState {
    pub store: Arc<dyn ReconcilerStore>,
    /// Required in queue mode.
    pub events: Option<Arc<dyn CallbackEventPublisher>>,
    pub config: Arc<ReconcilerConfig>,
    pub metrics: Arc<WebhookMetrics>,
}

/// Build the callback router.
pub fn webhook_routes(state: WebhookState) -> Router {
    Router::new()
        .route("/v1/webhooks/twilio/status", post(handle_twilio_status))
        .with_state(state)
}

async fn handle_twilio_status(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WebhookError> {
    let text = std::str::from_utf8(&body).map_err(|_| WebhookError::BadForm)?;
    let params = parse_form(text);

    let provided = headers
        .get("x-twilio-signature")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if provided.is_empty()
        || !verify_signature(
            &state.config.auth_token,
            &state.config.public_url,
            provided,
            &params,
        )
    {
        return Err(WebhookError::InvalidSignature);
    }

    let sid = params.get("MessageSid").cloned().unwrap_or_default();
    let status = params.get("MessageStatus").cloned().unwrap_or_default();
    let error_code = params
        .get("ErrorCode")
        .filter(|code| !code.is_empty())
        .cloned();

    state.metrics.record_event(&status);

    match state.config.mode {
        WebhookMode::Queue => enqueue_event(&state, sid, status, error_code).await,
        WebhookMode::Sync => {
            // Run the DB work on its own task so a client disconnect cannot
            // abort a half-applied callback.
            let store = Arc::clone(&state.store);
            let metrics = Arc::clone(&state.metrics);
            let config = Arc::clone(&state.config);
            let payload = serde_json::to_value(&params).unwrap_or_default();

            let task = tokio::spawn(apply_sync(
                store, metrics, config, sid, status, error_code, payload,
            ));
            task.await
                .map_err(|e| WebhookError::Internal(e.to_string()))?
        }
    }
}

/// Parse a form body into a sorted map, keeping the first value per key
/// (the canonical-string rule Twilio signs with).
fn parse_form(body: &str) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    for (key, value) in form_urlencoded::parse(body.as_bytes()) {
        params
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    params
}

async fn enqueue_event(
    state: &WebhookState,
    sid: String,
    status: String,
    error_code: Option<String>,
) -> Result<StatusCode, WebhookError> {
    let Some(events) = &state.events else {
        return Err(WebhookError::QueueNotConfigured);
    };

    let event = CallbackEvent {
        provider: PROVIDER_NAME.to_string(),
        provider_msg_id: sid,
        status,
        error_code,
        received_at: Utc::now(),
    };

    match tokio::time::timeout(state.config.enqueue_deadline, events.enqueue(&event)).await {
        Err(_) => Err(WebhookError::DeadlineExceeded),
        Ok(Err(e)) => Err(WebhookError::Enqueue(e)),
        Ok(Ok(())) => Ok(StatusCode::OK),
    }
}

async fn apply_sync(
    store: Arc<dyn ReconcilerStore>,
    metrics: Arc<WebhookMetrics>,
    config: Arc<ReconcilerConfig>,
    sid: String,
    status: String,
    error_code: Option<String>,
    payload: serde_json::Value,
) -> Result<StatusCode, WebhookError> {
    let deadline = tokio::time::Instant::now() + config.db_deadline;

    let event = NewDeliveryEvent {
        provider: PROVIDER_NAME.to_string(),
        provider_msg_id: sid.clone(),
        vendor_status: status.clone(),
        error_code: error_code.clone(),
        payload: Some(payload),
        occurred_at: None,
    };
    bounded(deadline, store.insert_delivery_event(&event)).await?;

    // Non-terminal statuses are log-only.
    let Some(new_state) = terminal_state_for(&status) else {
        return Ok(StatusCode::OK);
    };

    // The callback may have outrun the worker's provider-id persistence.
    // Retry briefly; a message that never appears would otherwise be stuck
    // in `submitted`, so surface it and let the provider redeliver.
    for attempt in 0..config.update_retries {
        let updated = bounded(
            deadline,
            store.update_by_provider_msg_id(
                PROVIDER_NAME,
                &sid,
                new_state,
                error_code.as_deref(),
                Utc::now(),
            ),
        )
        .await?;
        if updated {
            return Ok(StatusCode::OK);
        }

        let step = config.update_retry_step * (attempt + 1);
        if tokio::time::timeout_at(deadline, tokio::time::sleep(step))
            .await
            .is_err()
        {
            return Err(WebhookError::DeadlineExceeded);
        }
    }

    metrics.record_update_not_found(&status);
    tracing::warn!(
        provider_msg_id = %sid,
        status = %status,
        "No message row for terminal callback after retries; provider will redeliver"
    );
    Err(WebhookError::MessageNotFound)
}

async fn bounded<T>(
    deadline: tokio::time::Instant,
    work: impl Future<Output = Result<T, DbError>>,
) -> Result<T, WebhookError> {
    match tokio::time::timeout_at(deadline, work).await {
        Err(_) => Err(WebhookError::DeadlineExceeded),
        Ok(Err(e)) => Err(WebhookError::Db(e)),
        Ok(Ok(value)) => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_form_keeps_first_value() {
        let params = parse_form("A=1&B=2&A=3");
        assert_eq!(params.get("A").map(String::as_str), Some("1"));
        assert_eq!(params.get("B").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_parse_form_decodes_percent_encoding() {
        let params = parse_form("To=%2B15550100000&MessageStatus=delivered");
        assert_eq!(params.get("To").map(String::as_str), Some("+15550100000"));
    }

    #[test]
    fn test_webhook_mode_parse() {
        assert_eq!(WebhookMode::parse("sync"), Some(WebhookMode::Sync));
        assert_eq!(WebhookMode::parse("queue"), Some(WebhookMode::Queue));
        assert_eq!(WebhookMode::parse("inline"), None);
    }
}

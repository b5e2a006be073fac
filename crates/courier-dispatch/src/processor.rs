//! Per-job dispatch processing.
//!
//! The processor is an idempotent at-least-once consumer: it short-circuits
//! on terminal or already-submitted messages, claims the row before doing
//! any work, and expresses every outcome as a message state transition the
//! redelivered job can observe.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::instrument;

use courier_core::render::render_template;
use courier_core::MessageState;
use courier_db::models::{MessageForWorker, NewProviderAttempt};
use courier_provider::{backoff, SendError, SendRequest, TwilioSender, PROVIDER_NAME};
use courier_queue::Job;

use crate::breaker::CircuitBreaker;
use crate::error::DispatchError;
use crate::limiter::TokenBucket;
use crate::metrics::{DispatchMetrics, ProcessedLabels};
use crate::store::DispatchStore;

/// Sleep after a local rate-limit acquisition timeout.
const RATE_LIMITED_SLEEP: Duration = Duration::from_millis(200);

/// Processor tuning.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Template id → template body.
    pub templates: HashMap<String, String>,
    /// Age at which a `processing` claim is considered abandoned.
    pub claim_stale_after: chrono::Duration,
    /// Per-attempt deadline on the provider call.
    pub attempt_timeout: Duration,
    /// How long to wait for a rate-limit token.
    pub limiter_acquire_timeout: Duration,
    /// Provider attempts per job.
    pub max_attempts: u32,
    /// Callback URL passed to the provider on each send.
    pub status_callback_url: Option<String>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            templates: HashMap::new(),
            claim_stale_after: chrono::Duration::minutes(2),
            attempt_timeout: Duration::from_secs(6),
            limiter_acquire_timeout: Duration::from_secs(2),
            max_attempts: 3,
            status_callback_url: None,
        }
    }
}

/// Processes dispatch jobs: claim, render, rate-limit, send, persist.
pub struct Processor {
    store: Arc<dyn DispatchStore>,
    sender: Arc<dyn TwilioSender>,
    limiter: TokenBucket,
    breaker: CircuitBreaker,
    metrics: Arc<DispatchMetrics>,
    config: ProcessorConfig,
}

impl Processor {
    pub fn new(
        store: Arc<dyn DispatchStore>,
        sender: Arc<dyn TwilioSender>,
        limiter: TokenBucket,
        breaker: CircuitBreaker,
        metrics: Arc<DispatchMetrics>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            store,
            sender,
            limiter,
            breaker,
            metrics,
            config,
        }
    }

    /// Process one dispatch job.
    ///
    /// An `Err` leaves the broker receipt un-acked; the job redelivers
    /// after the visibility timeout and re-enters through the idempotency
    /// guards at the top.
    #[instrument(skip_all, fields(message_id = %job.message_id))]
    pub async fn process(&self, job: &Job) -> Result<(), DispatchError> {
        let msg = self
            .store
            .get_for_worker(&job.message_id)
            .await?
            .ok_or_else(|| DispatchError::MessageNotFound(job.message_id.clone()))?;

        // Idempotent consumer: nothing to do for terminal rows, or for
        // rows another run already handed to the provider.
        if msg.state.is_terminal() {
            return Ok(());
        }
        if msg.state == MessageState::Submitted && msg.provider_msg_id.is_some() {
            return Ok(());
        }

        let claimed = self
            .store
            .claim(&job.message_id, Utc::now(), self.config.claim_stale_after)
            .await?;
        if !claimed {
            // Another worker owns the message.
            return Ok(());
        }

        let started = Instant::now();
        let result = self.dispatch(job, &msg).await;

        let outcome = match &result {
            Ok(()) => "success",
            Err(DispatchError::TemplateNotFound(_)) => "failure_invalid_template",
            Err(DispatchError::BreakerOpen) => "failure_throttled_breaker",
            Err(DispatchError::NonRetryable(_)) => "failure_non_retryable",
            Err(DispatchError::RetryExhausted { .. }) => "failure_retry_exhausted",
            Err(_) => "error",
        };
        self.metrics
            .processed_total
            .get_or_create(&ProcessedLabels {
                result: outcome.to_string(),
            })
            .inc();
        self.metrics
            .processing_seconds
            .observe(started.elapsed().as_secs_f64());

        result
    }

    async fn dispatch(&self, job: &Job, msg: &MessageForWorker) -> Result<(), DispatchError> {
        let template = self
            .config
            .templates
            .get(&msg.template_id)
            .filter(|body| !body.is_empty());
        let Some(template) = template else {
            self.store
                .mark_state(
                    &job.message_id,
                    MessageState::Failed,
                    Some("template_not_found"),
                    Utc::now(),
                )
                .await?;
            return Err(DispatchError::TemplateNotFound(msg.template_id.clone()));
        };

        let request = SendRequest {
            to: msg.to.clone(),
            body: render_template(template, &msg.vars),
            status_callback_url: self.config.status_callback_url.clone(),
        };

        let mut latency_recorded = false;
        let mut last_error = String::new();

        for attempt in 0..self.config.max_attempts as usize {
            // Refuse before spending a rate-limit token: a breaker refusal
            // consumes neither allowance nor a provider attempt.
            if !self.breaker.allows() {
                self.metrics.record_send("failed_breaker_open", None);
                return Err(DispatchError::BreakerOpen);
            }

            if !self
                .limiter
                .acquire(self.config.limiter_acquire_timeout)
                .await
            {
                self.metrics.record_send("rate_limited_local", None);
                last_error = "local rate limit acquisition timed out".to_string();
                tokio::time::sleep(RATE_LIMITED_SLEEP).await;
                continue;
            }

            if !self.breaker.try_acquire() {
                self.metrics.record_send("failed_breaker_open", None);
                return Err(DispatchError::BreakerOpen);
            }

            let call_started = Instant::now();
            let outcome = match tokio::time::timeout(
                self.config.attempt_timeout,
                self.sender.send(&request),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(SendError::Timeout),
            };

            if !latency_recorded {
                latency_recorded = true;
                self.metrics
                    .send_latency_seconds
                    .observe(call_started.elapsed().as_secs_f64());
                let age = (Utc::now() - msg.created_at).to_std().unwrap_or_default();
                self.metrics.end_to_end_seconds.observe(age.as_secs_f64());
            }

            match outcome {
                Ok(success) => {
                    self.breaker.record_success();
                    self.metrics.record_send("ok", Some(success.http_status));

                    self.store
                        .insert_attempt(&NewProviderAttempt {
                            message_id: job.message_id.clone(),
                            provider: PROVIDER_NAME.to_string(),
                            provider_msg_id: Some(success.sid.clone()),
                            http_status: i32::from(success.http_status),
                            error_code: None,
                            error_msg: None,
                            request_json: request_snapshot(msg),
                            response_json: serde_json::json!({ "raw": success.raw_body }),
                        })
                        .await?;

                    self.store
                        .set_provider_details(
                            &job.message_id,
                            PROVIDER_NAME,
                            &success.sid,
                            MessageState::Submitted,
                            Utc::now(),
                        )
                        .await?;

                    return Ok(());
                }
                Err(error) => {
                    self.breaker.record_failure();
                    self.metrics.record_send("error", error.http_status());

                    self.store
                        .insert_attempt(&NewProviderAttempt {
                            message_id: job.message_id.clone(),
                            provider: PROVIDER_NAME.to_string(),
                            provider_msg_id: None,
                            http_status: error.http_status().map_or(0, i32::from),
                            error_code: error.error_code().map(|code| code.to_string()),
                            error_msg: Some(error.to_string()),
                            request_json: request_snapshot(msg),
                            response_json: serde_json::json!({
                                "raw": error.raw_body().unwrap_or_default()
                            }),
                        })
                        .await?;

                    if !error.is_retryable() {
                        self.store
                            .mark_state(
                                &job.message_id,
                                MessageState::Failed,
                                Some("twilio_non_retryable"),
                                Utc::now(),
                            )
                            .await?;
                        return Err(DispatchError::NonRetryable(error));
                    }

                    last_error = error.to_string();
                    tokio::time::sleep(backoff(attempt)).await;
                }
            }
        }

        self.store
            .mark_state(
                &job.message_id,
                MessageState::Failed,
                Some("twilio_retry_exhausted"),
                Utc::now(),
            )
            .await?;

        Err(DispatchError::RetryExhausted { last_error })
    }
}

fn request_snapshot(msg: &MessageForWorker) -> serde_json::Value {
    serde_json::json!({
        "to": msg.to,
        "templateId": msg.template_id,
        "campaignId": msg.campaign_id,
        "tenantId": msg.tenant_id,
    })
}

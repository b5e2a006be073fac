//! Dispatch error types.
//!
//! Any error returned from the processor leaves the broker receipt
//! un-acked, so the job redelivers after the visibility timeout. For
//! terminal outcomes the message row is already marked `failed` before the
//! error propagates; the redelivered job then short-circuits on the
//! terminal-state guard.

use courier_provider::SendError;
use thiserror::Error;

use courier_db::DbError;

/// Errors from processing one dispatch job.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Store call failed; transient, resolved by redelivery.
    #[error("database error: {0}")]
    Db(#[from] DbError),

    /// The job references a message row that does not exist.
    #[error("message not found: {0}")]
    MessageNotFound(String),

    /// No template body configured for the message's template id.
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    /// The circuit breaker refused the call. The message is left
    /// untouched; redelivery retries once the provider recovers.
    #[error("circuit breaker open")]
    BreakerOpen,

    /// The provider rejected the send with a non-retryable outcome.
    #[error("non-retryable provider failure: {0}")]
    NonRetryable(#[source] SendError),

    /// All attempts failed with retryable outcomes.
    #[error("provider retries exhausted: {last_error}")]
    RetryExhausted { last_error: String },
}

//! Durable queue handoff for the courier SMS pipeline.
//!
//! The broker contract is a thin publish/receive/delete surface with SQS
//! FIFO semantics behind it: group keys serialize delivery per key, dedup
//! keys reject duplicate publishes within the broker's window, and
//! non-acked receipts redeliver after the visibility timeout.
//!
//! Consumers are at-least-once by construction; every handler wired into
//! [`consumer::ConsumerPool`] must be idempotent.

pub mod broker;
pub mod consumer;
pub mod events;
pub mod job;
pub mod memory;

pub use broker::{Broker, ReceiveOptions, ReceivedMessage, SqsBroker};
pub use consumer::{ConsumerOptions, ConsumerPool, HandlerError};
pub use events::{CallbackEvent, CallbackEventProducer, CallbackEventPublisher};
pub use job::{group_key, Job, JobProducer, JobPublisher, DEFAULT_GROUP_BUCKETS};

use thiserror::Error;

/// Errors returned by the queue layer.
#[derive(Debug, Error)]
pub enum QueueError {
    /// SQS call failed.
    #[error("SQS error: {0}")]
    Sqs(#[from] aws_sdk_sqs::Error),

    /// Payload could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

//! Internal callback-event queue payload and producer.
//!
//! When the webhook ingress runs in queue mode it converts each verified
//! provider callback into a `CallbackEvent` and defers the database work to
//! the event processor. The raw callback payload is deliberately omitted to
//! keep queue messages small.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::broker::Broker;
use crate::QueueError;

/// Internal envelope for a provider status callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackEvent {
    pub provider: String,
    pub provider_msg_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// Seam for publishing callback events.
#[async_trait]
pub trait CallbackEventPublisher: Send + Sync {
    async fn enqueue(&self, event: &CallbackEvent) -> Result<(), QueueError>;
}

/// Publishes callback events to the internal event queue.
///
/// No group or dedup keys: ordering does not matter here (the terminal
/// update is conditional) and the reconciler tolerates duplicates.
pub struct CallbackEventProducer {
    broker: Arc<dyn Broker>,
}

impl CallbackEventProducer {
    #[must_use]
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl CallbackEventPublisher for CallbackEventProducer {
    async fn enqueue(&self, event: &CallbackEvent) -> Result<(), QueueError> {
        let body = serde_json::to_string(event)?;
        self.broker.publish(body, None, None).await
    }
}

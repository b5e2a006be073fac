//! Provider status-callback reconciliation.
//!
//! The HTTP ingress verifies each callback's signature, persists a
//! `DeliveryEvent`, and applies terminal vendor statuses to the message
//! row. Callbacks can outrun the worker's `provider_msg_id` persistence;
//! the sync path retries briefly and otherwise answers 503 so the provider
//! redelivers, and the queue path defers the same logic to the event
//! processor, where a missed update becomes a broker redelivery.

pub mod error;
pub mod handler;
pub mod metrics;
pub mod processor;
pub mod store;

pub use error::WebhookError;
pub use handler::{webhook_routes, ReconcilerConfig, WebhookMode, WebhookState};
pub use metrics::WebhookMetrics;
pub use processor::EventProcessor;
pub use store::{PgReconcilerStore, ReconcilerStore};

use courier_core::MessageState;

/// Map a vendor status to the terminal message state it implies, if any.
///
/// Non-terminal statuses (`queued`, `sent`, `accepted`, ...) are persisted
/// as delivery events but never change message state.
#[must_use]
pub fn terminal_state_for(vendor_status: &str) -> Option<MessageState> {
    match vendor_status {
        "delivered" => Some(MessageState::Delivered),
        "failed" | "undelivered" => Some(MessageState::Failed),
        _ => None,
    }
}

//! Database models implementing the store contract.

pub mod consent;
pub mod delivery_event;
pub mod message;
pub mod provider_attempt;
pub mod send_cap;
pub mod suppression;

pub use consent::ConsentRecord;
pub use delivery_event::{DeliveryEvent, NewDeliveryEvent};
pub use message::{IdempotencyResult, Message, MessageForWorker, NewMessage};
pub use provider_attempt::{NewProviderAttempt, ProviderAttempt};
pub use send_cap::{CapDecision, SendCap};
pub use suppression::SuppressionEntry;

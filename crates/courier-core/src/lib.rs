//! Core domain types shared across the courier pipeline.
//!
//! This crate holds the pieces every component agrees on: message
//! identifiers, the message lifecycle state machine, template rendering,
//! and destination normalization. It deliberately has no I/O dependencies.

pub mod config;
pub mod ids;
pub mod logging;
pub mod render;
pub mod state;

pub use ids::{MessageId, ParseMessageIdError};
pub use state::MessageState;

//! Twilio SMS provider integration.
//!
//! Two concerns live here: the outbound send contract (REST call, outcome
//! classification, retry backoff schedule) and inbound callback signature
//! verification. The wire details stay in this crate; the dispatch worker
//! only sees [`TwilioSender`], [`SendSuccess`] and [`SendError`].

pub mod client;
pub mod signature;

pub use client::{
    backoff, SendError, SendRequest, SendSuccess, TwilioClient, TwilioClientConfig, TwilioSender,
};
pub use signature::{compute_signature, verify_signature};

/// Provider name recorded on messages, attempts and delivery events.
pub const PROVIDER_NAME: &str = "twilio";

//! Ingress API for the courier SMS pipeline.
//!
//! Hosts the admission policy engine (idempotency, suppression, consent,
//! daily caps) behind the HTTP surface that accepts send requests and
//! serves message lookups. The policy engine is the only component that
//! creates message rows.

pub mod error;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod router;
pub mod services;
pub mod store;

pub use error::ApiError;
pub use metrics::ApiMetrics;
pub use router::{api_routes, ApiState};
pub use services::admission::{AdmissionService, CreateOutcome, SmsRequest};
pub use store::{AdmissionStore, PgAdmissionStore};

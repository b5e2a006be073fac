//! `PostgreSQL` persistence for the courier SMS pipeline.
//!
//! Exposes the store contract consumed by the admission path, the dispatch
//! worker and the callback reconciler: message rows with conditional state
//! transitions, consent and suppression lookups, the transactional daily
//! cap counter, and the append-only attempt/event logs.
//!
//! All message mutations are conditional updates (state-conditioned WHERE
//! clauses with affected-row checks) so concurrent workers never
//! read-modify-write outside a transaction.

pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;

pub use error::DbError;
pub use migrations::run_migrations;
pub use pool::{DbPool, DbPoolOptions};

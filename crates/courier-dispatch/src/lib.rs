//! Dispatch worker for the courier SMS pipeline.
//!
//! Consumes dispatch jobs at-least-once, claims the message row, renders
//! the body and calls the provider under two independent controls: a
//! per-process token bucket that shapes steady traffic, and a circuit
//! breaker that sheds load during sustained provider failure. The two
//! compose; a breaker refusal consumes neither a token nor a provider
//! attempt, and never fails the message — the broker redelivers later.

pub mod breaker;
pub mod error;
pub mod limiter;
pub mod metrics;
pub mod processor;
pub mod store;

pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use error::DispatchError;
pub use limiter::{RateLimitConfig, TokenBucket};
pub use metrics::DispatchMetrics;
pub use processor::{Processor, ProcessorConfig};
pub use store::{DispatchStore, PgDispatchStore};

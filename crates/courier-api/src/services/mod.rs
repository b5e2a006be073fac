//! API services.

pub mod admission;

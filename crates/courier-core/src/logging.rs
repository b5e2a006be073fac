//! Structured JSON logging setup using tracing.
//!
//! Shared by every binary so log lines are uniform across the pipeline and
//! friendly to log aggregation. `LOG_FILTER`/`RUST_LOG` style directives
//! override the default filter.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber with JSON output.
///
/// # Arguments
///
/// * `filter` - Default filter directive (e.g. "info,courier=debug"),
///   overridable via the `RUST_LOG` environment variable.
///
/// # Panics
///
/// Panics if a global subscriber has already been installed.
pub fn init_logging(filter: &str) {
    let filter_layer = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    let fmt_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter_layer)
        .init();

    tracing::info!(filter = %filter, "Logging initialized");
}

/// Initialize logging for tests (plain output, never panics on re-init).
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("debug")
        .try_init();
}

//! Reconciler metrics.

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

/// Labels carrying the vendor status of a callback.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct StatusLabels {
    pub status: String,
}

/// Metric families owned by the reconciler and event processor.
#[derive(Debug)]
pub struct WebhookMetrics {
    /// Received callbacks, labeled by vendor status.
    pub events_total: Family<StatusLabels, Counter>,
    /// Terminal callbacks whose message row was never found; these asked
    /// the provider to redeliver.
    pub update_not_found_total: Family<StatusLabels, Counter>,
}

impl WebhookMetrics {
    /// Create the metric families and register them.
    pub fn register(registry: &mut Registry) -> Self {
        let metrics = Self::unregistered();

        registry.register(
            "courier_webhook_events",
            "Provider status callbacks received",
            metrics.events_total.clone(),
        );
        registry.register(
            "courier_webhook_update_not_found",
            "Terminal callbacks with no matching message row after retries",
            metrics.update_not_found_total.clone(),
        );

        metrics
    }

    /// Create families without registering them (tests).
    #[must_use]
    pub fn unregistered() -> Self {
        Self {
            events_total: Family::default(),
            update_not_found_total: Family::default(),
        }
    }

    pub(crate) fn record_event(&self, status: &str) {
        self.events_total
            .get_or_create(&StatusLabels {
                status: status.to_string(),
            })
            .inc();
    }

    pub(crate) fn record_update_not_found(&self, status: &str) {
        self.update_not_found_total
            .get_or_create(&StatusLabels {
                status: status.to_string(),
            })
            .inc();
    }
}

//! Dispatch worker metrics.

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

/// Labels for provider send outcomes.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct SendLabels {
    pub result: String,
    pub http_status: String,
}

/// Labels for processed-job outcomes.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ProcessedLabels {
    pub result: String,
}

/// Metric families owned by the dispatch worker.
#[derive(Debug)]
pub struct DispatchMetrics {
    /// Provider send outcomes, labeled by (result, http status).
    pub send_total: Family<SendLabels, Counter>,
    /// Latency of individual provider calls.
    pub send_latency_seconds: Histogram,
    /// Message age from creation to first completed provider attempt.
    pub end_to_end_seconds: Histogram,
    /// Processed jobs, labeled by outcome.
    pub processed_total: Family<ProcessedLabels, Counter>,
    /// Wall time spent processing a claimed job.
    pub processing_seconds: Histogram,
}

impl DispatchMetrics {
    /// Create the metric families and register them.
    pub fn register(registry: &mut Registry) -> Self {
        let metrics = Self::unregistered();

        registry.register(
            "courier_twilio_send",
            "Twilio send outcomes",
            metrics.send_total.clone(),
        );
        registry.register(
            "courier_twilio_send_latency_seconds",
            "Twilio send latency",
            metrics.send_latency_seconds.clone(),
        );
        registry.register(
            "courier_end_to_end_seconds",
            "Message age at first completed provider attempt",
            metrics.end_to_end_seconds.clone(),
        );
        registry.register(
            "courier_worker_processed",
            "Processed dispatch jobs",
            metrics.processed_total.clone(),
        );
        registry.register(
            "courier_worker_processing_seconds",
            "Dispatch job processing time",
            metrics.processing_seconds.clone(),
        );

        metrics
    }

    /// Create families without registering them (tests).
    #[must_use]
    pub fn unregistered() -> Self {
        Self {
            send_total: Family::default(),
            send_latency_seconds: Histogram::new(exponential_buckets(0.005, 2.0, 12)),
            end_to_end_seconds: Histogram::new(exponential_buckets(0.05, 2.0, 12)),
            processed_total: Family::default(),
            processing_seconds: Histogram::new(exponential_buckets(0.005, 2.0, 12)),
        }
    }

    pub(crate) fn record_send(&self, result: &str, http_status: Option<u16>) {
        let http_status = http_status.map_or_else(|| "0".to_string(), |s| s.to_string());
        self.send_total
            .get_or_create(&SendLabels {
                result: result.to_string(),
                http_status,
            })
            .inc();
    }
}

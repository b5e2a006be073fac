//! In-memory broker for tests and local development.
//!
//! Mimics the SQS semantics the pipeline relies on: receive moves messages
//! to an in-flight set, delete acks them, and dedup keys suppress duplicate
//! publishes (silently, as SQS FIFO does). Visibility timeouts are not
//! timer-driven; tests trigger redelivery explicitly with
//! [`InMemoryBroker::redeliver_in_flight`]. Per-group FIFO ordering is not
//! simulated.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::broker::{Broker, ReceiveOptions, ReceivedMessage};
use crate::QueueError;

#[derive(Default)]
struct Inner {
    queued: VecDeque<ReceivedMessage>,
    in_flight: HashMap<String, ReceivedMessage>,
    dedup_seen: HashSet<String>,
}

/// A broker that lives entirely in process memory.
#[derive(Default)]
pub struct InMemoryBroker {
    inner: Mutex<Inner>,
    next_receipt: AtomicU64,
    published: AtomicU64,
}

impl InMemoryBroker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages currently waiting for delivery.
    pub async fn queued_len(&self) -> usize {
        self.inner.lock().await.queued.len()
    }

    /// Messages received but not yet acked.
    pub async fn in_flight_len(&self) -> usize {
        self.inner.lock().await.in_flight.len()
    }

    /// Total accepted publishes (deduplicated publishes do not count).
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::SeqCst)
    }

    /// Simulate visibility timeouts: requeue everything in flight.
    pub async fn redeliver_in_flight(&self) {
        let mut inner = self.inner.lock().await;
        let receipts: Vec<String> = inner.in_flight.keys().cloned().collect();
        for receipt in receipts {
            if let Some(message) = inner.in_flight.remove(&receipt) {
                inner.queued.push_back(message);
            }
        }
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn publish(
        &self,
        body: String,
        _group_key: Option<String>,
        dedup_key: Option<String>,
    ) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().await;

        if let Some(key) = dedup_key {
            if !inner.dedup_seen.insert(key) {
                // Duplicate inside the dedup window: accepted, not enqueued.
                return Ok(());
            }
        }

        let receipt = format!("rcpt-{}", self.next_receipt.fetch_add(1, Ordering::SeqCst));
        inner.queued.push_back(ReceivedMessage { body, receipt });
        self.published.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn receive(&self, opts: &ReceiveOptions) -> Result<Vec<ReceivedMessage>, QueueError> {
        let batch = {
            let mut inner = self.inner.lock().await;
            let take = usize::try_from(opts.max_messages.max(0)).unwrap_or(0);
            let mut batch = Vec::with_capacity(take);
            while batch.len() < take {
                let Some(message) = inner.queued.pop_front() else {
                    break;
                };
                inner
                    .in_flight
                    .insert(message.receipt.clone(), message.clone());
                batch.push(message);
            }
            batch
        };

        if batch.is_empty() {
            // Keep callers from busy-looping the way long polling would.
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(batch)
    }

    async fn delete(&self, receipt: &str) -> Result<(), QueueError> {
        self.inner.lock().await.in_flight.remove(receipt);
        Ok(())
    }

    async fn healthcheck(&self) -> Result<(), QueueError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_receive_delete_cycle() {
        let broker = InMemoryBroker::new();
        broker.publish("one".into(), None, None).await.unwrap();

        let batch = broker.receive(&ReceiveOptions::default()).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].body, "one");
        assert_eq!(broker.in_flight_len().await, 1);

        broker.delete(&batch[0].receipt).await.unwrap();
        assert_eq!(broker.in_flight_len().await, 0);
        assert_eq!(broker.queued_len().await, 0);
    }

    #[tokio::test]
    async fn test_dedup_key_suppresses_duplicate_publish() {
        let broker = InMemoryBroker::new();
        broker
            .publish("one".into(), None, Some("idem-1".into()))
            .await
            .unwrap();
        broker
            .publish("one again".into(), None, Some("idem-1".into()))
            .await
            .unwrap();

        assert_eq!(broker.queued_len().await, 1);
        assert_eq!(broker.published_count(), 1);
    }

    #[tokio::test]
    async fn test_redelivery_after_missed_ack() {
        let broker = InMemoryBroker::new();
        broker.publish("one".into(), None, None).await.unwrap();

        let batch = broker.receive(&ReceiveOptions::default()).await.unwrap();
        assert_eq!(batch.len(), 1);

        broker.redeliver_in_flight().await;
        let batch = broker.receive(&ReceiveOptions::default()).await.unwrap();
        assert_eq!(batch.len(), 1, "unacked message must be redelivered");
    }
}

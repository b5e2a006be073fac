//! SMS dispatch job payload and producer.
//!
//! Jobs are published with two control keys:
//!
//! - **group key** `"<tenantId>:b<bucket>"` where `bucket = fnv1a32(to)
//!   mod N`. A group key per destination would explode FIFO cardinality; a
//!   single group per tenant would serialize the whole tenant. Bucketing
//!   keeps per-destination ordering while allowing parallelism across
//!   destinations and tenants.
//! - **dedup key** = the request's idempotency key, so a retried publish
//!   inside the broker's dedup window cannot double-enqueue.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::broker::Broker;
use crate::QueueError;

/// Default number of FIFO group buckets per tenant.
pub const DEFAULT_GROUP_BUCKETS: u32 = 2000;

/// Queue payload for one SMS dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub tenant_id: String,
    pub message_id: String,
    pub idempotency_key: String,
    pub to: String,
    pub template_id: String,
    pub vars: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
}

/// Seam for publishing jobs; lets the admission path run against fakes.
#[async_trait]
pub trait JobPublisher: Send + Sync {
    async fn enqueue(&self, job: &Job) -> Result<(), QueueError>;
}

/// Publishes jobs to the dispatch queue with bucketed group keys.
pub struct JobProducer {
    broker: Arc<dyn Broker>,
    group_buckets: u32,
}

impl JobProducer {
    /// Create a producer. `group_buckets == 0` falls back to the default.
    #[must_use]
    pub fn new(broker: Arc<dyn Broker>, group_buckets: u32) -> Self {
        Self {
            broker,
            group_buckets,
        }
    }
}

#[async_trait]
impl JobPublisher for JobProducer {
    async fn enqueue(&self, job: &Job) -> Result<(), QueueError> {
        let body = serde_json::to_string(job)?;
        let group = group_key(&job.tenant_id, &job.to, self.group_buckets);

        self.broker
            .publish(body, Some(group), Some(job.idempotency_key.clone()))
            .await
    }
}

/// Compute the FIFO group key for a (tenant, destination) pair.
#[must_use]
pub fn group_key(tenant_id: &str, to: &str, buckets: u32) -> String {
    let buckets = if buckets == 0 {
        DEFAULT_GROUP_BUCKETS
    } else {
        buckets
    };
    let bucket = fnv1a32(to.as_bytes()) % buckets;
    format!("{tenant_id}:b{bucket}")
}

/// FNV-1a 32-bit. Stable across processes and releases, which the group
/// key depends on; do not swap for a randomized hasher.
fn fnv1a32(data: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    let mut hash = OFFSET_BASIS;
    for &byte in data {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a32_known_vectors() {
        assert_eq!(fnv1a32(b""), 0x811c_9dc5);
        assert_eq!(fnv1a32(b"a"), 0xe40c_292c);
        assert_eq!(fnv1a32(b"foobar"), 0xbf9c_f968);
    }

    #[test]
    fn test_group_key_is_stable() {
        let a = group_key("t1", "+15550100000", 2000);
        let b = group_key("t1", "+15550100000", 2000);
        assert_eq!(a, b);
        assert!(a.starts_with("t1:b"));
    }

    #[test]
    fn test_group_key_bucket_is_bounded() {
        for i in 0..100 {
            let key = group_key("t1", &format!("+1555010{i:04}"), 16);
            let bucket: u32 = key.strip_prefix("t1:b").unwrap().parse().unwrap();
            assert!(bucket < 16);
        }
    }

    #[test]
    fn test_group_key_zero_buckets_uses_default() {
        let key = group_key("t1", "+15550100000", 0);
        let bucket: u32 = key.strip_prefix("t1:b").unwrap().parse().unwrap();
        assert!(bucket < DEFAULT_GROUP_BUCKETS);
    }

    #[test]
    fn test_group_key_separates_tenants() {
        let a = group_key("t1", "+15550100000", 2000);
        let b = group_key("t2", "+15550100000", 2000);
        assert_ne!(a, b);
    }

    #[test]
    fn test_job_wire_format_is_camel_case() {
        let job = Job {
            tenant_id: "t1".into(),
            message_id: "msg_0191".into(),
            idempotency_key: "idem-1".into(),
            to: "+15550100000".into(),
            template_id: "txn_confirm_v1".into(),
            vars: HashMap::from([("name".to_string(), "Ada".to_string())]),
            campaign_id: None,
        };

        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["tenantId"], "t1");
        assert_eq!(value["messageId"], "msg_0191");
        assert_eq!(value["idempotencyKey"], "idem-1");
        assert_eq!(value["templateId"], "txn_confirm_v1");
        assert!(value.get("campaignId").is_none());
    }

    #[test]
    fn test_job_round_trip() {
        let job = Job {
            tenant_id: "t1".into(),
            message_id: "msg_0191".into(),
            idempotency_key: "idem-1".into(),
            to: "+15550100000".into(),
            template_id: "txn_confirm_v1".into(),
            vars: HashMap::new(),
            campaign_id: Some("spring".into()),
        };

        let body = serde_json::to_string(&job).unwrap();
        let back: Job = serde_json::from_str(&body).unwrap();
        assert_eq!(back.message_id, job.message_id);
        assert_eq!(back.campaign_id.as_deref(), Some("spring"));
    }
}

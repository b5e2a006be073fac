//! Broker contract and the SQS implementation.

use async_trait::async_trait;
use aws_sdk_sqs::types::QueueAttributeName;
use aws_sdk_sqs::Client;

use crate::QueueError;

/// A message handed out by [`Broker::receive`].
///
/// The receipt is the broker's handle for acknowledging this delivery; it
/// is only valid until the visibility timeout elapses.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub body: String,
    pub receipt: String,
}

/// Long-poll receive parameters.
#[derive(Debug, Clone, Copy)]
pub struct ReceiveOptions {
    /// Maximum messages per receive call.
    pub max_messages: i32,
    /// Long-poll wait in seconds.
    pub wait_time_seconds: i32,
    /// How long a received message stays invisible before redelivery.
    pub visibility_timeout_seconds: i32,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            max_messages: 10,
            wait_time_seconds: 20,
            visibility_timeout_seconds: 60,
        }
    }
}

/// Minimal queue broker surface consumed by producers and the consumer
/// pool. Redelivery of non-acked messages and dead-lettering are broker
/// policy, not modeled here.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Publish a message. `group_key` serializes delivery per key (FIFO);
    /// `dedup_key` suppresses duplicate publishes inside the broker's
    /// deduplication window.
    async fn publish(
        &self,
        body: String,
        group_key: Option<String>,
        dedup_key: Option<String>,
    ) -> Result<(), QueueError>;

    /// Long-poll for up to `max_messages` messages.
    async fn receive(&self, opts: &ReceiveOptions) -> Result<Vec<ReceivedMessage>, QueueError>;

    /// Acknowledge (delete) a received message by its receipt.
    async fn delete(&self, receipt: &str) -> Result<(), QueueError>;

    /// Cheap reachability probe for readiness checks.
    async fn healthcheck(&self) -> Result<(), QueueError>;
}

/// SQS-backed broker.
#[derive(Clone)]
pub struct SqsBroker {
    client: Client,
    queue_url: String,
}

impl SqsBroker {
    /// Wrap an SQS client and queue URL.
    #[must_use]
    pub fn new(client: Client, queue_url: String) -> Self {
        Self { client, queue_url }
    }

    /// Build an SQS client for `region`, optionally overriding the endpoint
    /// (LocalStack and friends).
    pub async fn build_client(region: &str, endpoint_url: Option<&str>) -> Client {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;

        let mut builder = aws_sdk_sqs::config::Builder::from(&config);
        if let Some(url) = endpoint_url {
            builder = builder.endpoint_url(url);
        }
        Client::from_conf(builder.build())
    }

    /// The queue URL this broker publishes to and consumes from.
    #[must_use]
    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

#[async_trait]
impl Broker for SqsBroker {
    async fn publish(
        &self,
        body: String,
        group_key: Option<String>,
        dedup_key: Option<String>,
    ) -> Result<(), QueueError> {
        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .set_message_group_id(group_key)
            .set_message_deduplication_id(dedup_key)
            .send()
            .await
            .map_err(aws_sdk_sqs::Error::from)?;

        Ok(())
    }

    async fn receive(&self, opts: &ReceiveOptions) -> Result<Vec<ReceivedMessage>, QueueError> {
        let out = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(opts.max_messages)
            .wait_time_seconds(opts.wait_time_seconds)
            .visibility_timeout(opts.visibility_timeout_seconds)
            .send()
            .await
            .map_err(aws_sdk_sqs::Error::from)?;

        let messages = out
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| {
                let body = m.body?;
                let receipt = m.receipt_handle?;
                Some(ReceivedMessage { body, receipt })
            })
            .collect();

        Ok(messages)
    }

    async fn delete(&self, receipt: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt)
            .send()
            .await
            .map_err(aws_sdk_sqs::Error::from)?;

        Ok(())
    }

    async fn healthcheck(&self) -> Result<(), QueueError> {
        self.client
            .get_queue_attributes()
            .queue_url(&self.queue_url)
            .attribute_names(QueueAttributeName::QueueArn)
            .send()
            .await
            .map_err(aws_sdk_sqs::Error::from)?;

        Ok(())
    }
}

//! SQS implementation of the delivery queue
//!
//! Messages carry the target URL as the body and the crawl depth as a
//! numeric-typed `depth` attribute. Send delays are clamped to the SQS
//! maximum of 900 seconds.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_sqs::types::{MessageAttributeValue, SendMessageBatchRequestEntry};
use aws_sdk_sqs::Client;

use crate::storage::{
    BatchEntry, BatchFailure, DeliveryQueue, QueueError, QueueMessage, QUEUE_BATCH_SIZE,
    QUEUE_MAX_DELAY,
};

/// Delivery queue adapter backed by an SQS queue
#[derive(Debug, Clone)]
pub struct SqsQueue {
    client: Client,
    queue_url: String,
}

impl SqsQueue {
    pub fn new(client: Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }

    fn depth_attribute(depth: u32) -> Result<MessageAttributeValue, QueueError> {
        MessageAttributeValue::builder()
            .data_type("Number")
            .string_value(depth.to_string())
            .build()
            .map_err(|e| QueueError::Backend(e.to_string()))
    }
}

#[async_trait]
impl DeliveryQueue for SqsQueue {
    async fn send(
        &self,
        url: &str,
        depth: u32,
        delay: Option<Duration>,
    ) -> Result<(), QueueError> {
        let delay_seconds = delay
            .map(|d| d.min(QUEUE_MAX_DELAY).as_secs() as i32)
            .unwrap_or(0);

        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(url)
            .delay_seconds(delay_seconds)
            .message_attributes("depth", Self::depth_attribute(depth)?)
            .send()
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn send_batch(&self, entries: &[BatchEntry]) -> Result<Vec<BatchFailure>, QueueError> {
        debug_assert!(entries.len() <= QUEUE_BATCH_SIZE);

        let mut request = self.client.send_message_batch().queue_url(&self.queue_url);
        for entry in entries {
            request = request.entries(
                SendMessageBatchRequestEntry::builder()
                    .id(&entry.id)
                    .message_body(&entry.body)
                    .message_attributes("depth", Self::depth_attribute(entry.depth)?)
                    .build()
                    .map_err(|e| QueueError::Backend(e.to_string()))?,
            );
        }

        let output = request
            .send()
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;

        Ok(output
            .failed()
            .iter()
            .map(|f| BatchFailure {
                id: f.id().to_string(),
                code: f.code().to_string(),
                message: f.message().unwrap_or_default().to_string(),
            })
            .collect())
    }

    async fn receive(
        &self,
        max_messages: usize,
        wait: Duration,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages.min(10) as i32)
            .wait_time_seconds(wait.as_secs().min(20) as i32)
            .message_attribute_names("All")
            .send()
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;

        Ok(output
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|m| {
                let attributes: HashMap<String, String> = m
                    .message_attributes
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|(k, v)| v.string_value.map(|s| (k, s)))
                    .collect();
                QueueMessage {
                    message_id: m.message_id.unwrap_or_default(),
                    receipt: m.receipt_handle.unwrap_or_default(),
                    body: m.body.unwrap_or_default(),
                    attributes,
                }
            })
            .collect())
    }

    async fn acknowledge(&self, receipt: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt)
            .send()
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(())
    }
}

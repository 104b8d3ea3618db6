//! Adapters for the three external collaborators
//!
//! The state store, delivery queue and blob store are each abstracted by a
//! small trait so the pipeline never touches an SDK type directly.
//! Production implementations live in [`dynamo`], [`sqs`] and [`s3`];
//! in-memory fakes for tests live in [`memory`]. Cross-worker coordination
//! happens exclusively through the conditional writes exposed here — no
//! leases, no locks.

pub mod archive;
pub mod dynamo;
pub mod memory;
pub mod s3;
pub mod sqs;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{FetchResult, UrlStatus};

pub use archive::{ArchiveError, ContentArchiver};
pub use dynamo::DynamoStateStore;
pub use memory::{MemoryBlobStore, MemoryQueue, MemoryStateStore};
pub use s3::S3BlobStore;
pub use sqs::SqsQueue;

/// Key prefix for domain rate-limit records in the flat key space
pub const DOMAIN_KEY_PREFIX: &str = "domain#";

/// Key prefix for allowlist records
pub const ALLOWED_DOMAIN_KEY_PREFIX: &str = "allowed_domain#";

/// TTL applied to URL records when they reach a terminal state
pub const ITEM_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Maximum entries per batch send request
pub const QUEUE_BATCH_SIZE: usize = 10;

/// Transport cap on the per-message send delay
pub const QUEUE_MAX_DELAY: Duration = Duration::from_secs(900);

/// State store request failure. Conditional-check outcomes are not errors;
/// they surface as `Ok(false)` from the boolean operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("state store request failed: {0}")]
    Backend(String),
}

/// Delivery queue request failure
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("queue request failed: {0}")]
    Backend(String),
}

/// Blob store request failure
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("blob store request failed: {0}")]
    Backend(String),
}

/// One delivered work item: a target URL plus its crawl depth attribute.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub message_id: String,
    pub receipt: String,
    /// The target URL
    pub body: String,
    /// String-valued message attributes
    pub attributes: HashMap<String, String>,
}

impl QueueMessage {
    /// The crawl depth carried by this message; absent or unparseable
    /// attributes mean depth 0.
    pub fn depth(&self) -> u32 {
        self.attributes
            .get("depth")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}

/// One entry of a batch send (at most [`QUEUE_BATCH_SIZE`] per request).
#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub id: String,
    pub body: String,
    pub depth: u32,
}

/// Per-entry failure reported by a partially failed batch send.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub id: String,
    pub code: String,
    pub message: String,
}

/// Conditional state transitions on the key-value store.
///
/// Every cross-worker coordination primitive the crawler uses is one of the
/// conditional writes below: the claim's `status = queued` gate, the
/// allowlist and URL inserts' not-exists gates, and the rate-limit token's
/// `last_crawled_at < min_ts` gate.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Attempt the `queued -> processing` transition. Returns true iff this
    /// caller won the race; exactly one concurrent caller per URL does.
    /// Increments `attempts` and stamps `processing_at` on success.
    async fn claim(&self, url_hash: &str) -> Result<bool, StoreError>;

    /// Unconditionally set a terminal status and `finished_at`. Used for
    /// terminal non-fetch outcomes such as a robots denial.
    async fn mark_status(&self, url_hash: &str, status: UrlStatus) -> Result<(), StoreError>;

    /// Unconditionally reset `status` to queued so a later delivery can
    /// reclaim the URL. Only the rate-limit and retriable-failure paths call
    /// this.
    async fn reset_to_queued(&self, url_hash: &str) -> Result<(), StoreError>;

    /// Persist the terminal outcome of a fetch: status (`done` on success,
    /// `failed` otherwise), `finished_at`, the 7-day TTL, and the fetch
    /// metadata attributes.
    async fn save_fetch_result(
        &self,
        url_hash: &str,
        result: &FetchResult,
        depth: u32,
    ) -> Result<(), StoreError>;

    /// Record where the archived content lives. Callers treat failures as
    /// log-only: the content is durable, only the pointer is missing.
    async fn save_archive_keys(
        &self,
        url_hash: &str,
        bucket: &str,
        raw_key: &str,
        text_key: &str,
    ) -> Result<(), StoreError>;

    /// Atomically take the per-domain rate-limit token: succeeds iff the
    /// domain record does not exist or its `last_crawled_at` is older than
    /// `min_ts_ms`, setting `last_crawled_at = now_ms` on success.
    async fn try_reserve_domain(
        &self,
        domain: &str,
        now_ms: i64,
        min_ts_ms: i64,
    ) -> Result<bool, StoreError>;

    /// Whether the host has an allowlist record with status `active`.
    async fn is_domain_allowed(&self, host: &str) -> Result<bool, StoreError>;

    /// Conditionally insert a new active allowlist record. Returns true iff
    /// this call created it (the host was previously unknown).
    async fn try_add_domain(&self, host: &str, discovered_from: &str)
        -> Result<bool, StoreError>;

    /// Conditionally insert a new URL record with status `queued`. Returns
    /// true iff inserted; false means the URL is already known. This is the
    /// dedup gate for discovered links.
    async fn try_claim_url(&self, url_hash: &str, url: &str) -> Result<bool, StoreError>;
}

/// The at-least-once delivery transport.
#[async_trait]
pub trait DeliveryQueue: Send + Sync {
    /// Send one URL with its depth attribute, optionally delayed. Delays are
    /// clamped to [`QUEUE_MAX_DELAY`] by the implementation.
    async fn send(&self, url: &str, depth: u32, delay: Option<Duration>)
        -> Result<(), QueueError>;

    /// Send one batch of at most [`QUEUE_BATCH_SIZE`] entries. Returns the
    /// per-entry failures; an empty list means every entry was accepted.
    async fn send_batch(&self, entries: &[BatchEntry]) -> Result<Vec<BatchFailure>, QueueError>;

    /// Long-poll for up to `max_messages` deliveries.
    async fn receive(
        &self,
        max_messages: usize,
        wait: Duration,
    ) -> Result<Vec<QueueMessage>, QueueError>;

    /// Acknowledge (delete) an in-flight delivery. Withholding the ACK lets
    /// the visibility timeout expire and the transport redeliver.
    async fn acknowledge(&self, receipt: &str) -> Result<(), QueueError>;
}

/// Whole-object writes to the archive bucket.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// The bucket name recorded alongside archive pointers.
    fn bucket(&self) -> &str;

    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
        content_encoding: &str,
    ) -> Result<(), BlobError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_with_depth(depth: Option<&str>) -> QueueMessage {
        let mut attributes = HashMap::new();
        if let Some(d) = depth {
            attributes.insert("depth".to_string(), d.to_string());
        }
        QueueMessage {
            message_id: "m-1".to_string(),
            receipt: "r-1".to_string(),
            body: "https://example.com/".to_string(),
            attributes,
        }
    }

    #[test]
    fn test_depth_parsing() {
        assert_eq!(message_with_depth(Some("2")).depth(), 2);
        assert_eq!(message_with_depth(None).depth(), 0);
        assert_eq!(message_with_depth(Some("not a number")).depth(), 0);
        assert_eq!(message_with_depth(Some("-1")).depth(), 0);
    }
}

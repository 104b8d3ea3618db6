//! In-memory fakes for the three collaborators
//!
//! Tests drive the pipeline against these instead of cloud SDKs. Each fake
//! keeps a per-call log and supports targeted failure injection, mirroring
//! how the conditional-write semantics behave in the real stores: a failed
//! condition is an `Ok(false)`, an injected outage is an `Err`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::crawler::url;
use crate::models::{DomainStatus, FetchResult, UrlStatus};
use crate::storage::{
    BatchEntry, BatchFailure, BlobError, BlobStore, DeliveryQueue, QueueError, QueueMessage,
    StateStore, StoreError,
};

/// A URL record held by the fake state store
#[derive(Debug, Clone)]
pub struct UrlRecord {
    pub url: String,
    pub status: UrlStatus,
    pub attempts: u32,
    pub http_status: Option<u16>,
    pub crawl_depth: Option<u32>,
    pub fetch_error: Option<String>,
    /// (bucket, raw_key, text_key) once archive pointers were saved
    pub archive: Option<(String, String, String)>,
    /// Whether a TTL was stamped (terminal fetch outcomes only)
    pub has_ttl: bool,
}

impl UrlRecord {
    fn new(url: &str, status: UrlStatus) -> Self {
        Self {
            url: url.to_string(),
            status,
            attempts: 0,
            http_status: None,
            crawl_depth: None,
            fetch_error: None,
            archive: None,
            has_ttl: false,
        }
    }
}

/// A domain rate-limit record
#[derive(Debug, Clone)]
pub struct DomainRecord {
    pub last_crawled_at: i64,
}

/// An allowlist record
#[derive(Debug, Clone)]
pub struct AllowlistRecord {
    pub status: DomainStatus,
    pub discovered_from: String,
}

/// Fake state store with call logging and failure injection
#[derive(Default)]
pub struct MemoryStateStore {
    urls: Mutex<HashMap<String, UrlRecord>>,
    domains: Mutex<HashMap<String, DomainRecord>>,
    allowlist: Mutex<HashMap<String, AllowlistRecord>>,
    calls: Mutex<Vec<&'static str>>,
    fail_ops: Mutex<HashSet<&'static str>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a URL record in the given status; returns its hash.
    pub fn seed_url(&self, target: &str, status: UrlStatus) -> String {
        let h = url::hash(target);
        self.urls
            .lock()
            .unwrap()
            .insert(h.clone(), UrlRecord::new(target, status));
        h
    }

    /// Seed a domain rate-limit record.
    pub fn seed_domain_last_crawl(&self, domain: &str, ts_ms: i64) {
        self.domains.lock().unwrap().insert(
            domain.to_string(),
            DomainRecord {
                last_crawled_at: ts_ms,
            },
        );
    }

    /// Seed an allowlist record.
    pub fn seed_allowed_domain(&self, host: &str, status: DomainStatus) {
        self.allowlist.lock().unwrap().insert(
            host.to_string(),
            AllowlistRecord {
                status,
                discovered_from: String::from("seed"),
            },
        );
    }

    /// Make the named operation return an error on every subsequent call.
    pub fn fail_on(&self, op: &'static str) {
        self.fail_ops.lock().unwrap().insert(op);
    }

    /// The sequence of operations invoked so far.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls to the named operation.
    pub fn call_count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|&&c| c == op).count()
    }

    pub fn url_record(&self, url_hash: &str) -> Option<UrlRecord> {
        self.urls.lock().unwrap().get(url_hash).cloned()
    }

    pub fn allowlist_record(&self, host: &str) -> Option<AllowlistRecord> {
        self.allowlist.lock().unwrap().get(host).cloned()
    }

    pub fn domain_record(&self, domain: &str) -> Option<DomainRecord> {
        self.domains.lock().unwrap().get(domain).cloned()
    }

    fn enter(&self, op: &'static str) -> Result<(), StoreError> {
        self.calls.lock().unwrap().push(op);
        if self.fail_ops.lock().unwrap().contains(op) {
            return Err(StoreError::Backend(format!("injected failure: {op}")));
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn claim(&self, url_hash: &str) -> Result<bool, StoreError> {
        self.enter("claim")?;
        let mut urls = self.urls.lock().unwrap();
        match urls.get_mut(url_hash) {
            Some(record) if record.status == UrlStatus::Queued => {
                record.status = UrlStatus::Processing;
                record.attempts += 1;
                Ok(true)
            }
            // Missing record or any other status fails the condition
            _ => Ok(false),
        }
    }

    async fn mark_status(&self, url_hash: &str, status: UrlStatus) -> Result<(), StoreError> {
        self.enter("mark_status")?;
        let mut urls = self.urls.lock().unwrap();
        urls.entry(url_hash.to_string())
            .or_insert_with(|| UrlRecord::new("", status))
            .status = status;
        Ok(())
    }

    async fn reset_to_queued(&self, url_hash: &str) -> Result<(), StoreError> {
        self.enter("reset_to_queued")?;
        let mut urls = self.urls.lock().unwrap();
        urls.entry(url_hash.to_string())
            .or_insert_with(|| UrlRecord::new("", UrlStatus::Queued))
            .status = UrlStatus::Queued;
        Ok(())
    }

    async fn save_fetch_result(
        &self,
        url_hash: &str,
        result: &FetchResult,
        depth: u32,
    ) -> Result<(), StoreError> {
        self.enter("save_fetch_result")?;
        let status = if result.success {
            UrlStatus::Done
        } else {
            UrlStatus::Failed
        };
        let mut urls = self.urls.lock().unwrap();
        let record = urls
            .entry(url_hash.to_string())
            .or_insert_with(|| UrlRecord::new("", status));
        record.status = status;
        record.http_status = Some(result.status_code);
        record.crawl_depth = Some(depth);
        record.fetch_error = Some(result.error.clone());
        record.has_ttl = true;
        Ok(())
    }

    async fn save_archive_keys(
        &self,
        url_hash: &str,
        bucket: &str,
        raw_key: &str,
        text_key: &str,
    ) -> Result<(), StoreError> {
        self.enter("save_archive_keys")?;
        if let Some(record) = self.urls.lock().unwrap().get_mut(url_hash) {
            record.archive = Some((
                bucket.to_string(),
                raw_key.to_string(),
                text_key.to_string(),
            ));
        }
        Ok(())
    }

    async fn try_reserve_domain(
        &self,
        domain: &str,
        now_ms: i64,
        min_ts_ms: i64,
    ) -> Result<bool, StoreError> {
        self.enter("try_reserve_domain")?;
        let mut domains = self.domains.lock().unwrap();
        match domains.get_mut(domain) {
            None => {
                domains.insert(
                    domain.to_string(),
                    DomainRecord {
                        last_crawled_at: now_ms,
                    },
                );
                Ok(true)
            }
            Some(record) if record.last_crawled_at < min_ts_ms => {
                record.last_crawled_at = now_ms;
                Ok(true)
            }
            Some(_) => Ok(false),
        }
    }

    async fn is_domain_allowed(&self, host: &str) -> Result<bool, StoreError> {
        self.enter("is_domain_allowed")?;
        Ok(self
            .allowlist
            .lock()
            .unwrap()
            .get(host)
            .map(|r| r.status == DomainStatus::Active)
            .unwrap_or(false))
    }

    async fn try_add_domain(
        &self,
        host: &str,
        discovered_from: &str,
    ) -> Result<bool, StoreError> {
        self.enter("try_add_domain")?;
        let mut allowlist = self.allowlist.lock().unwrap();
        if allowlist.contains_key(host) {
            return Ok(false);
        }
        allowlist.insert(
            host.to_string(),
            AllowlistRecord {
                status: DomainStatus::Active,
                discovered_from: discovered_from.to_string(),
            },
        );
        Ok(true)
    }

    async fn try_claim_url(&self, url_hash: &str, target: &str) -> Result<bool, StoreError> {
        self.enter("try_claim_url")?;
        let mut urls = self.urls.lock().unwrap();
        if urls.contains_key(url_hash) {
            return Ok(false);
        }
        urls.insert(
            url_hash.to_string(),
            UrlRecord::new(target, UrlStatus::Queued),
        );
        Ok(true)
    }
}

/// One message recorded by [`MemoryQueue::send`]
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub body: String,
    pub depth: u32,
    pub delay: Option<Duration>,
}

/// Fake delivery queue recording sends and serving seeded deliveries
#[derive(Default)]
pub struct MemoryQueue {
    sent: Mutex<Vec<SentMessage>>,
    batches: Mutex<Vec<Vec<BatchEntry>>>,
    incoming: Mutex<VecDeque<QueueMessage>>,
    acknowledged: Mutex<Vec<String>>,
    fail_entry_ids: Mutex<HashSet<String>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a delivery for the next `receive` call.
    pub fn push_incoming(&self, message: QueueMessage) {
        self.incoming.lock().unwrap().push_back(message);
    }

    /// Mark a batch entry id as failing in every subsequent batch send.
    pub fn fail_entry(&self, id: impl Into<String>) {
        self.fail_entry_ids.lock().unwrap().insert(id.into());
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Sizes of the batch sends, in call order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }

    pub fn batches(&self) -> Vec<Vec<BatchEntry>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn acknowledged(&self) -> Vec<String> {
        self.acknowledged.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryQueue for MemoryQueue {
    async fn send(
        &self,
        target: &str,
        depth: u32,
        delay: Option<Duration>,
    ) -> Result<(), QueueError> {
        self.sent.lock().unwrap().push(SentMessage {
            body: target.to_string(),
            depth,
            delay,
        });
        Ok(())
    }

    async fn send_batch(&self, entries: &[BatchEntry]) -> Result<Vec<BatchFailure>, QueueError> {
        self.batches.lock().unwrap().push(entries.to_vec());
        let failing = self.fail_entry_ids.lock().unwrap();
        Ok(entries
            .iter()
            .filter(|e| failing.contains(&e.id))
            .map(|e| BatchFailure {
                id: e.id.clone(),
                code: "InternalError".to_string(),
                message: "injected batch failure".to_string(),
            })
            .collect())
    }

    async fn receive(
        &self,
        max_messages: usize,
        _wait: Duration,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let mut incoming = self.incoming.lock().unwrap();
        let take = incoming.len().min(max_messages);
        Ok(incoming.drain(..take).collect())
    }

    async fn acknowledge(&self, receipt: &str) -> Result<(), QueueError> {
        self.acknowledged.lock().unwrap().push(receipt.to_string());
        Ok(())
    }
}

/// One object stored by [`MemoryBlobStore`]
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
    pub content_encoding: String,
}

/// Fake blob store
pub struct MemoryBlobStore {
    bucket: String,
    objects: Mutex<HashMap<String, StoredObject>>,
    fail_keys: Mutex<HashSet<String>>,
}

impl MemoryBlobStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Mutex::new(HashMap::new()),
            fail_keys: Mutex::new(HashSet::new()),
        }
    }

    /// Make uploads of the given key fail.
    pub fn fail_key(&self, key: impl Into<String>) {
        self.fail_keys.lock().unwrap().insert(key.into());
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
        content_encoding: &str,
    ) -> Result<(), BlobError> {
        if self.fail_keys.lock().unwrap().contains(key) {
            return Err(BlobError::Backend(format!("injected failure: {key}")));
        }
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
                content_encoding: content_encoding.to_string(),
            },
        );
        Ok(())
    }
}

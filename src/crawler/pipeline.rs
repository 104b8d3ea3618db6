//! The per-message crawl pipeline
//!
//! One delivered message drives one URL through claim, robots check, rate
//! limit, fetch, persistence, archival, and link fan-out. Duplicate
//! deliveries are resolved by the claim's conditional write: exactly one
//! processor wins, every other delivery ACKs silently. A message's failure
//! never aborts the rest of its batch.

use std::sync::Arc;
use std::time::Duration;

use aws_config::BehaviorVersion;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::crawler::fetcher::{is_permanent_http, Fetcher};
use crate::crawler::ratelimit::DomainRateLimiter;
use crate::crawler::robots::RobotsCache;
use crate::crawler::url as urlid;
use crate::error::{Error, Result};
use crate::models::{FetchResult, UrlStatus};
use crate::parser;
use crate::storage::{
    BatchEntry, BlobStore, ContentArchiver, DeliveryQueue, DynamoStateStore, QueueMessage,
    S3BlobStore, SqsQueue, StateStore, QUEUE_BATCH_SIZE,
};

/// Messages requested per poll
const RECEIVE_BATCH: usize = 10;

/// Long-poll wait per receive call
const RECEIVE_WAIT: Duration = Duration::from_secs(20);

/// The worker: composes the stores, fetcher, robots cache and rate limiter
/// into the per-message state machine.
///
/// Processing is sequential within one worker instance because the robots
/// cache is process-local mutable state; fleet-level parallelism is
/// coordinated entirely through the state store's conditional writes.
pub struct Crawler<S, Q, B> {
    state: Arc<S>,
    queue: Arc<Q>,
    archiver: ContentArchiver<B>,
    fetcher: Arc<Fetcher>,
    robots: RobotsCache,
    rate: DomainRateLimiter<S>,
    max_depth: u32,
    requeue_delay: Duration,
}

impl Crawler<DynamoStateStore, SqsQueue, S3BlobStore> {
    /// Build a production worker from the environment configuration and the
    /// ambient AWS credentials chain.
    pub async fn from_env(config: Config) -> anyhow::Result<Self> {
        let aws = aws_config::defaults(BehaviorVersion::latest()).load().await;

        let state = Arc::new(DynamoStateStore::new(
            aws_sdk_dynamodb::Client::new(&aws),
            &config.table_name,
        ));
        let queue = Arc::new(SqsQueue::new(
            aws_sdk_sqs::Client::new(&aws),
            &config.queue_url,
        ));
        let blob = Arc::new(S3BlobStore::new(
            aws_sdk_s3::Client::new(&aws),
            &config.content_bucket,
        ));
        let fetcher = Arc::new(Fetcher::new(&config.user_agent)?);

        info!(
            max_depth = config.max_depth,
            crawl_delay_ms = config.crawl_delay_ms,
            content_bucket = %config.content_bucket,
            "crawler initialized"
        );

        Ok(Self::with_parts(&config, state, queue, blob, fetcher))
    }
}

impl<S, Q, B> Crawler<S, Q, B>
where
    S: StateStore,
    Q: DeliveryQueue,
    B: BlobStore,
{
    /// Assemble a worker from explicit parts. Tests use this with the
    /// in-memory stores and an unguarded fetcher.
    pub fn with_parts(
        config: &Config,
        state: Arc<S>,
        queue: Arc<Q>,
        blob: Arc<B>,
        fetcher: Arc<Fetcher>,
    ) -> Self {
        let robots = RobotsCache::new(Arc::clone(&fetcher), config.robots_agent());
        let rate = DomainRateLimiter::new(Arc::clone(&state), config.crawl_delay_ms);
        Self {
            state,
            queue,
            archiver: ContentArchiver::new(blob),
            fetcher,
            robots,
            rate,
            max_depth: config.max_depth,
            requeue_delay: config.requeue_delay(),
        }
    }

    /// Direct access to the robots cache, for seeding rules in tests.
    pub fn robots_mut(&mut self) -> &mut RobotsCache {
        &mut self.robots
    }

    /// Poll and process until cancelled. Receive errors are logged and
    /// retried after a short pause rather than tearing the worker down.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            if let Err(err) = self.poll_once().await {
                error!(error = %err, "poll failed");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }

    /// One receive/process cycle. Returns the number of messages received.
    pub async fn poll_once(&mut self) -> Result<usize> {
        let messages = self.queue.receive(RECEIVE_BATCH, RECEIVE_WAIT).await?;
        if messages.is_empty() {
            debug!("no messages");
            return Ok(0);
        }

        info!(count = messages.len(), "received batch");
        let count = messages.len();
        self.handle_batch(messages).await;
        Ok(count)
    }

    /// Process a batch in delivery order. A message is acknowledged on
    /// success and left in flight on failure so the transport redelivers it
    /// after the visibility timeout; one message's failure never stops the
    /// rest of the batch.
    pub async fn handle_batch(&mut self, messages: Vec<QueueMessage>) {
        for message in &messages {
            match self.process_message(message).await {
                Ok(()) => {
                    if let Err(err) = self.queue.acknowledge(&message.receipt).await {
                        error!(
                            message_id = %message.message_id,
                            error = %err,
                            "failed to acknowledge message"
                        );
                    }
                }
                Err(err) => {
                    error!(
                        message_id = %message.message_id,
                        error = %err,
                        "failed to process message"
                    );
                }
            }
        }
    }

    /// Drive one URL through the state machine.
    pub async fn process_message(&mut self, message: &QueueMessage) -> Result<()> {
        let target = message.body.as_str();
        let depth = message.depth();
        let url_hash = urlid::hash(target);

        info!(url = %target, depth, "processing");

        if !self.state.claim(&url_hash).await? {
            // The ordinary dedup outcome under duplicate delivery
            warn!(url = %target, "lost claim race, already claimed");
            return Ok(());
        }
        debug!(url = %target, "won claim race, checking robots.txt");

        if !self.robots.is_allowed(target).await {
            info!(url = %target, "blocked by robots.txt");
            self.state
                .mark_status(&url_hash, UrlStatus::RobotsBlocked)
                .await?;
            return Ok(());
        }

        let domain = urlid::scheme_and_host(target);
        if !self.rate.check(&domain).await? {
            return self.handle_rate_limited(target, &url_hash, depth).await;
        }

        let result = self.fetcher.fetch(target).await;

        if !result.success {
            if result.status_code > 0 && is_permanent_http(result.status_code) {
                // Permanent failure (404, 403, ...): save and acknowledge
                warn!(
                    url = %target,
                    status = result.status_code,
                    ms = result.duration_ms,
                    "permanent failure"
                );
                self.state
                    .save_fetch_result(&url_hash, &result, depth)
                    .await?;
                return Ok(());
            }

            // Retriable failure (5xx, network error, SSRF block, ...):
            // reset the claim so a later delivery can retry, then surface
            // the error so this delivery is not acknowledged.
            warn!(
                url = %target,
                status = result.status_code,
                error = %result.error,
                ms = result.duration_ms,
                "retriable failure"
            );
            if let Err(err) = self.state.reset_to_queued(&url_hash).await {
                warn!(url = %target, error = %err, "failed to reset status before retry");
            }
            return Err(Error::Retriable {
                url: target.to_string(),
                status: result.status_code,
                reason: result.error.clone(),
            });
        }

        self.state
            .save_fetch_result(&url_hash, &result, depth)
            .await?;
        info!(
            url = %target,
            status = result.status_code,
            bytes = result.content_length,
            ms = result.duration_ms,
            "fetched successfully"
        );

        self.process_html_content(target, &url_hash, &result, depth)
            .await;
        Ok(())
    }

    /// Archive HTML content and fan out discovered links. Failures here are
    /// logged, never propagated: the URL already reached its terminal state.
    async fn process_html_content(
        &mut self,
        target: &str,
        url_hash: &str,
        result: &FetchResult,
        depth: u32,
    ) {
        if !parser::is_html(&result.content_type) || result.body.is_empty() {
            return;
        }

        // Single-pass parse: extract both text and links
        let parsed = parser::extract(&result.body, target);

        match self
            .archiver
            .archive(url_hash, &result.body, &parsed.text)
            .await
        {
            Ok(keys) => {
                let bucket = self.archiver.bucket().to_string();
                if let Err(err) = self
                    .state
                    .save_archive_keys(url_hash, &bucket, &keys.raw_key, &keys.text_key)
                    .await
                {
                    // The content is durable, only the pointer is missing
                    error!(url = %target, error = %err, "failed to save archive pointers");
                } else {
                    info!(
                        url = %target,
                        raw_key = %keys.raw_key,
                        text_key = %keys.text_key,
                        text_len = parsed.text.len(),
                        "archived content"
                    );
                }
            }
            Err(err) => {
                error!(url = %target, error = %err, "failed to archive content");
            }
        }

        if depth < self.max_depth && !parsed.links.is_empty() {
            info!(url = %target, links_found = parsed.links.len(), "extracted links");
            let enqueued = self
                .enqueue_links(&parsed.links, depth + 1, target)
                .await;
            if enqueued > 0 {
                info!(
                    url = %target,
                    enqueued,
                    skipped = parsed.links.len() - enqueued,
                    child_depth = depth + 1,
                    "enqueued new links"
                );
            }
        }
    }

    /// The rate-limited path: put the claim back, then hand the URL to a
    /// later delivery. The current delivery is acknowledged; the delayed
    /// copy carries the work forward.
    async fn handle_rate_limited(&self, target: &str, url_hash: &str, depth: u32) -> Result<()> {
        info!(
            url = %target,
            domain = %urlid::scheme_and_host(target),
            "rate limited, re-queuing"
        );

        if let Err(err) = self.state.reset_to_queued(url_hash).await {
            warn!(url = %target, error = %err, "failed to reset rate-limited url");
        }

        self.queue
            .send(target, depth, Some(self.requeue_delay))
            .await?;
        Ok(())
    }

    /// Deduplicate and enqueue discovered links at the child depth. Returns
    /// the number successfully handed to the transport.
    async fn enqueue_links(&self, links: &[String], depth: u32, source_url: &str) -> usize {
        let mut pending: Vec<String> = Vec::new();
        let mut new_domains = 0usize;

        for link in links {
            let host = urlid::host(link);
            if host.is_empty() {
                continue;
            }

            // Check if the domain is allowed, auto-discover if unknown
            match self.state.is_domain_allowed(&host).await {
                Ok(true) => {}
                Ok(false) => match self.state.try_add_domain(&host, source_url).await {
                    Ok(true) => new_domains += 1,
                    Ok(false) => continue,
                    Err(err) => {
                        error!(host = %host, error = %err, "allowlist insert failed");
                        continue;
                    }
                },
                Err(err) => {
                    error!(host = %host, error = %err, "allowlist check failed");
                    continue;
                }
            }

            let link_hash = urlid::hash(link);
            match self.state.try_claim_url(&link_hash, link).await {
                Ok(true) => pending.push(link.clone()),
                // Already known: the ordinary dedup outcome
                Ok(false) => continue,
                Err(err) => {
                    error!(url = %link, error = %err, "url insert failed");
                    continue;
                }
            }
        }

        let mut enqueued = 0usize;
        for (chunk_index, chunk) in pending.chunks(QUEUE_BATCH_SIZE).enumerate() {
            let entries: Vec<BatchEntry> = chunk
                .iter()
                .enumerate()
                .map(|(offset, link)| BatchEntry {
                    id: (chunk_index * QUEUE_BATCH_SIZE + offset).to_string(),
                    body: link.clone(),
                    depth,
                })
                .collect();

            match self.queue.send_batch(&entries).await {
                Ok(failed) => {
                    enqueued += entries.len() - failed.len();
                    for failure in failed {
                        // The URL record stays queued with no message behind
                        // it; accepted as an orphan, see the design notes.
                        error!(
                            id = %failure.id,
                            code = %failure.code,
                            "failed to enqueue link in batch"
                        );
                    }
                }
                Err(err) => {
                    error!(
                        batch_size = entries.len(),
                        error = %err,
                        "failed to batch-enqueue links"
                    );
                }
            }
        }

        if new_domains > 0 {
            info!(new_domains, "auto-discovered new domains");
        }

        enqueued
    }
}

//! Shared helpers for integration tests: a worker wired to in-memory fakes.

use std::collections::HashMap;
use std::sync::Arc;

use trawler::config::Config;
use trawler::crawler::{Crawler, Fetcher};
use trawler::storage::{MemoryBlobStore, MemoryQueue, MemoryStateStore, QueueMessage};

/// A worker plus handles to the fakes behind it
pub struct TestWorld {
    pub state: Arc<MemoryStateStore>,
    pub queue: Arc<MemoryQueue>,
    pub blob: Arc<MemoryBlobStore>,
    pub crawler: Crawler<MemoryStateStore, MemoryQueue, MemoryBlobStore>,
}

pub fn test_config() -> Config {
    Config {
        table_name: "test-table".to_string(),
        queue_url: "https://sqs.us-east-1.amazonaws.com/123456789/test-queue".to_string(),
        content_bucket: "test-bucket".to_string(),
        max_depth: 3,
        crawl_delay_ms: 1000,
        user_agent: "trawler-test/0.0 (integration tests)".to_string(),
        log_format: "text".to_string(),
    }
}

/// Build a worker over fresh fakes. The fetcher is unguarded so tests can
/// target loopback mock servers.
pub fn build_world(config: Config) -> TestWorld {
    let state = Arc::new(MemoryStateStore::new());
    let queue = Arc::new(MemoryQueue::new());
    let blob = Arc::new(MemoryBlobStore::new(&config.content_bucket));
    let fetcher = Arc::new(Fetcher::unguarded(&config.user_agent).unwrap());

    let crawler = Crawler::with_parts(
        &config,
        Arc::clone(&state),
        Arc::clone(&queue),
        Arc::clone(&blob),
        fetcher,
    );

    TestWorld {
        state,
        queue,
        blob,
        crawler,
    }
}

pub fn world() -> TestWorld {
    build_world(test_config())
}

/// A delivered message with an optional string depth attribute
pub fn message(body: &str, depth: Option<&str>) -> QueueMessage {
    let mut attributes = HashMap::new();
    if let Some(d) = depth {
        attributes.insert("depth".to_string(), d.to_string());
    }
    QueueMessage {
        message_id: format!("mid-{}", body.len()),
        receipt: format!("receipt-{body}"),
        body: body.to_string(),
        attributes,
    }
}

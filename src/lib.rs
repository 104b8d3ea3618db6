//! trawler - Horizontally-scalable web crawler worker
//!
//! A queue-driven crawler that pulls URL work items from a delivery queue,
//! enforces exactly-once fetch semantics against a transactional key-value
//! store despite duplicate delivery, respects robots.txt and per-domain rate
//! limits, fetches pages under an SSRF-safe network policy, archives content
//! to a blob store, and fans discovered links back out through the queue.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`crawler`] - The per-message pipeline, fetcher, robots cache, rate
//!   limiter, SSRF guard and URL identity helpers
//! - [`parser`] - Single-pass HTML link and text extraction
//! - [`models`] - Core data structures and types
//! - [`storage`] - State store, delivery queue and blob store adapters
//! - [`utils`] - Common utilities (pooled gzip compression)
//!
//! # Example
//!
//! ```no_run
//! use trawler::config::Config;
//! use trawler::crawler::Crawler;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let mut crawler = Crawler::from_env(config).await?;
//!     crawler.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crawler;
pub mod error;
pub mod models;
pub mod parser;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::crawler::Crawler;
    pub use crate::error::{Error, Result};
    pub use crate::models::{FetchResult, UrlStatus};
    pub use crate::storage::{BlobStore, DeliveryQueue, QueueMessage, StateStore};
}

// Direct re-exports for convenience
pub use models::{FetchResult, UrlStatus};

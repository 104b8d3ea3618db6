//! Per-domain rate limiting through the state store
//!
//! The token is the domain record's `last_crawled_at` attribute; taking it
//! is a single conditional write, so concurrent workers across the fleet
//! contend correctly without any local locks. A blocked result means some
//! worker fetched this domain within the configured window.

use std::sync::Arc;

use chrono::Utc;

use crate::storage::{StateStore, StoreError};

/// Atomic per-domain crawl spacing
pub struct DomainRateLimiter<S> {
    store: Arc<S>,
    /// Minimum spacing between fetches of one domain; <= 0 disables
    delay_ms: i64,
}

impl<S: StateStore> DomainRateLimiter<S> {
    pub fn new(store: Arc<S>, delay_ms: i64) -> Self {
        Self { store, delay_ms }
    }

    pub fn enabled(&self) -> bool {
        self.delay_ms > 0
    }

    /// Try to take the domain's token. `Ok(true)` means the caller may fetch
    /// now and `last_crawled_at` has already been advanced atomically;
    /// `Ok(false)` means another fetch of this domain happened within the
    /// window.
    pub async fn check(&self, domain: &str) -> Result<bool, StoreError> {
        if self.delay_ms <= 0 {
            return Ok(true);
        }

        let now = Utc::now().timestamp_millis();
        let min_ts = now - self.delay_ms;
        self.store.try_reserve_domain(domain, now, min_ts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStateStore;

    #[tokio::test]
    async fn test_disabled_limiter_skips_store() {
        let store = Arc::new(MemoryStateStore::new());
        let limiter = DomainRateLimiter::new(Arc::clone(&store), 0);

        assert!(limiter.check("https://example.com").await.unwrap());
        assert_eq!(store.call_count("try_reserve_domain"), 0);
        assert!(!limiter.enabled());
    }

    #[tokio::test]
    async fn test_blocked_within_window() {
        let store = Arc::new(MemoryStateStore::new());
        let limiter = DomainRateLimiter::new(Arc::clone(&store), 60_000);

        assert!(limiter.check("https://example.com").await.unwrap());
        // Immediately again: the token was just taken
        assert!(!limiter.check("https://example.com").await.unwrap());
        // A different domain has its own token
        assert!(limiter.check("https://other.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_stale_record_allows() {
        let store = Arc::new(MemoryStateStore::new());
        let limiter = DomainRateLimiter::new(Arc::clone(&store), 1_000);

        let long_ago = Utc::now().timestamp_millis() - 10_000;
        store.seed_domain_last_crawl("https://example.com", long_ago);

        assert!(limiter.check("https://example.com").await.unwrap());
    }
}

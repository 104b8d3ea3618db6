//! Bounded per-process robots.txt cache
//!
//! Maps `scheme://host` to the fetched robots.txt body, or to a sentinel
//! meaning "no rules, allow all" when the file is missing, unreadable or
//! oversized. The cache is process-local, capped at 1000 entries with
//! random eviction, and holds no recency state. It is not safe for
//! concurrent mutation; the worker processes one message at a time.

use std::collections::HashMap;
use std::sync::Arc;

use rand::seq::IteratorRandom;
use robotstxt::DefaultMatcher;
use tracing::debug;

use crate::crawler::fetcher::Fetcher;
use crate::crawler::url as urlid;

/// Cap on bytes read from a robots.txt body
pub const MAX_ROBOTS_TXT_SIZE: u64 = 512 * 1024;

/// Hard cap on cached hosts
pub const MAX_ROBOTS_CACHE_SIZE: usize = 1000;

/// Per-process robots.txt cache keyed by `scheme://host`
pub struct RobotsCache {
    fetcher: Arc<Fetcher>,
    /// The robots agent token matched against User-agent groups
    agent: String,
    /// `None` is the allow-all sentinel
    entries: HashMap<String, Option<String>>,
}

impl RobotsCache {
    pub fn new(fetcher: Arc<Fetcher>, agent: impl Into<String>) -> Self {
        Self {
            fetcher,
            agent: agent.into(),
            entries: HashMap::new(),
        }
    }

    /// Whether robots rules permit fetching `target`.
    ///
    /// Returns true unless rules exist for the URL's host and they deny the
    /// URL's path for the configured agent. Any failure to obtain rules
    /// (fetch error, non-200, unreadable body) allows by default.
    pub async fn is_allowed(&mut self, target: &str) -> bool {
        let domain = urlid::scheme_and_host(target);
        if domain.is_empty() {
            return true;
        }

        self.ensure_cached(&domain).await;

        match self.entries.get(&domain) {
            Some(Some(body)) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(body, &self.agent, target)
            }
            _ => true,
        }
    }

    /// Insert rules for a domain directly. Tests use this to avoid the
    /// fetch path; `None` caches the allow-all sentinel.
    pub fn preload(&mut self, domain: impl Into<String>, body: Option<String>) {
        self.evict_if_full();
        self.entries.insert(domain.into(), body);
    }

    /// Number of cached hosts
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    async fn ensure_cached(&mut self, domain: &str) {
        if self.entries.contains_key(domain) {
            return;
        }
        let fetched = self.fetch_robots(domain).await;
        self.evict_if_full();
        self.entries.insert(domain.to_string(), fetched);
    }

    /// Fetch robots.txt for a domain. The shared fetcher applies the SSRF
    /// checks before any connection is made.
    async fn fetch_robots(&self, domain: &str) -> Option<String> {
        let robots_url = format!("{domain}/robots.txt");
        let result = self
            .fetcher
            .fetch_with_limit(&robots_url, MAX_ROBOTS_TXT_SIZE)
            .await;

        if !result.error.is_empty() {
            debug!(domain, error = %result.error, "robots.txt fetch failed, allowing all");
            return None;
        }
        if result.status_code != 200 {
            debug!(domain, status = result.status_code, "robots.txt not found, allowing all");
            return None;
        }

        match String::from_utf8(result.body) {
            Ok(body) => {
                debug!(domain, bytes = body.len(), "loaded robots.txt");
                Some(body)
            }
            Err(_) => None,
        }
    }

    /// Remove one random entry when the cache is at capacity. No recency
    /// tracking; random selection keeps this O(1)-ish and state-free.
    fn evict_if_full(&mut self) {
        if self.entries.len() < MAX_ROBOTS_CACHE_SIZE {
            return;
        }
        let victim = self
            .entries
            .keys()
            .choose(&mut rand::thread_rng())
            .cloned();
        if let Some(key) = victim {
            self.entries.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> RobotsCache {
        let fetcher = Arc::new(Fetcher::unguarded("trawler-test/0.0").unwrap());
        RobotsCache::new(fetcher, "trawler-test")
    }

    #[tokio::test]
    async fn test_rules_deny_matching_path() {
        let mut robots = cache();
        robots.preload(
            "https://example.com",
            Some("User-agent: *\nDisallow: /blocked".to_string()),
        );

        assert!(!robots.is_allowed("https://example.com/blocked").await);
        assert!(!robots.is_allowed("https://example.com/blocked/deeper").await);
        assert!(robots.is_allowed("https://example.com/open").await);
    }

    #[tokio::test]
    async fn test_sentinel_allows_all() {
        let mut robots = cache();
        robots.preload("https://example.com", None);
        assert!(robots.is_allowed("https://example.com/anything").await);
    }

    #[tokio::test]
    async fn test_unparseable_target_allowed() {
        let mut robots = cache();
        assert!(robots.is_allowed("not a url at all").await);
    }

    #[test]
    fn test_cache_bounded_with_random_eviction() {
        let mut robots = cache();
        for i in 0..(MAX_ROBOTS_CACHE_SIZE + 500) {
            robots.preload(format!("https://host-{i}.example"), None);
            assert!(robots.len() <= MAX_ROBOTS_CACHE_SIZE);
        }
        assert_eq!(robots.len(), MAX_ROBOTS_CACHE_SIZE);
    }

    #[tokio::test]
    async fn test_agent_specific_group() {
        let mut robots = cache();
        robots.preload(
            "https://example.com",
            Some("User-agent: trawler-test\nDisallow: /private\n\nUser-agent: *\nDisallow:".to_string()),
        );
        assert!(!robots.is_allowed("https://example.com/private").await);
        assert!(robots.is_allowed("https://example.com/public").await);
    }
}

//! Configuration management for the trawler worker
//!
//! This module loads and validates the process-wide configuration snapshot
//! from environment variables. Configuration is read once at startup; a
//! missing required value is fatal.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Default inclusive upper bound on depth for which link fan-out runs
const DEFAULT_MAX_DEPTH: u32 = 3;

/// Default per-domain minimum spacing between fetches (ms)
const DEFAULT_CRAWL_DELAY_MS: i64 = 1000;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// State store table name
    pub table_name: String,

    /// Delivery queue endpoint
    pub queue_url: String,

    /// Archive bucket name
    pub content_bucket: String,

    /// Inclusive upper bound on depth for which link fan-out runs
    pub max_depth: u32,

    /// Per-domain minimum spacing in milliseconds; <= 0 disables rate limiting
    pub crawl_delay_ms: i64,

    /// User agent string; the token before '/' doubles as the robots.txt
    /// agent token
    pub user_agent: String,

    /// Log format (text, json)
    pub log_format: String,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `TABLE_NAME`, `QUEUE_URL` or
    /// `CONTENT_BUCKET` is unset or empty.
    pub fn from_env() -> Result<Self> {
        let table_name = required_env("TABLE_NAME")?;
        let queue_url = required_env("QUEUE_URL")?;
        let content_bucket = required_env("CONTENT_BUCKET")?;

        let max_depth = std::env::var("MAX_DEPTH")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_DEPTH);

        let crawl_delay_ms = std::env::var("CRAWL_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(DEFAULT_CRAWL_DELAY_MS);

        let user_agent = std::env::var("TRAWLER_USER_AGENT").unwrap_or_else(|_| {
            format!(
                "trawler/{} (+https://github.com/example/trawler)",
                env!("CARGO_PKG_VERSION")
            )
        });

        let log_format =
            std::env::var("TRAWLER_LOG_FORMAT").unwrap_or_else(|_| String::from("text"));

        let config = Self {
            table_name,
            queue_url,
            content_bucket,
            max_depth,
            crawl_delay_ms,
            user_agent,
            log_format,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.user_agent.trim().is_empty() {
            return Err(Error::config("user_agent must not be empty"));
        }
        if self.log_format != "text" && self.log_format != "json" {
            return Err(Error::config(format!(
                "unknown log format: {}",
                self.log_format
            )));
        }
        Ok(())
    }

    /// The product token used for robots.txt agent matching: the part of the
    /// User-Agent before the first '/'.
    #[must_use]
    pub fn robots_agent(&self) -> &str {
        self.user_agent
            .split('/')
            .next()
            .unwrap_or(&self.user_agent)
    }

    /// Whether per-domain rate limiting is enabled
    #[must_use]
    pub fn rate_limiting_enabled(&self) -> bool {
        self.crawl_delay_ms > 0
    }

    /// The requeue delay used when a domain is rate limited
    #[must_use]
    pub fn requeue_delay(&self) -> Duration {
        Duration::from_secs((self.crawl_delay_ms / 1000).max(1) as u64)
    }
}

fn required_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Error::config(format!(
            "{name} environment variable not set"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            table_name: "crawl-state".to_string(),
            queue_url: "https://sqs.us-east-1.amazonaws.com/123456789/crawl".to_string(),
            content_bucket: "crawl-content".to_string(),
            max_depth: 3,
            crawl_delay_ms: 1000,
            user_agent: "trawler/0.3.1 (+https://github.com/example/trawler)".to_string(),
            log_format: "text".to_string(),
        }
    }

    #[test]
    fn test_robots_agent_token() {
        let config = test_config();
        assert_eq!(config.robots_agent(), "trawler");
    }

    #[test]
    fn test_requeue_delay_floor() {
        let mut config = test_config();
        config.crawl_delay_ms = 250;
        assert_eq!(config.requeue_delay(), Duration::from_secs(1));

        config.crawl_delay_ms = 5000;
        assert_eq!(config.requeue_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_rate_limiting_disabled() {
        let mut config = test_config();
        config.crawl_delay_ms = 0;
        assert!(!config.rate_limiting_enabled());
        config.crawl_delay_ms = -5;
        assert!(!config.rate_limiting_enabled());
    }

    #[test]
    fn test_validate_rejects_unknown_log_format() {
        let mut config = test_config();
        config.log_format = "yaml".to_string();
        assert!(config.validate().is_err());
    }
}

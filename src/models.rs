//! Core data structures shared across the crawler modules

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states of a URL record in the state store.
///
/// Transitions are driven exclusively through the state store adapter:
/// `Queued -> Processing` via the conditional claim, terminal states only
/// from `Processing`, and `Processing -> Queued` only on the rate-limit and
/// retriable-failure requeue paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlStatus {
    Queued,
    Processing,
    Done,
    Failed,
    RobotsBlocked,
}

impl UrlStatus {
    /// The attribute value persisted in the state store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::RobotsBlocked => "robots_blocked",
        }
    }

    /// Whether this status ends the record's lifecycle (TTL applies).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::RobotsBlocked)
    }
}

impl fmt::Display for UrlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Allowlist states for a discovered host. Only `Active` hosts are eligible
/// for crawling; `Paused` and `Blocked` are operator-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainStatus {
    Active,
    Paused,
    Blocked,
}

impl DomainStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Blocked => "blocked",
        }
    }
}

/// The outcome of fetching one URL.
///
/// `success` is true iff the status code was in `[200, 400)`. Redirects are
/// never followed, so a 3xx lands here verbatim with its body (if any).
#[derive(Debug, Clone, Default)]
pub struct FetchResult {
    pub success: bool,
    pub status_code: u16,
    pub content_length: u64,
    pub content_type: String,
    pub duration_ms: u64,
    pub error: String,
    /// For HTML pages, contains the body for link extraction
    pub body: Vec<u8>,
}

impl FetchResult {
    /// A failure result with no HTTP exchange (request build, SSRF block).
    pub fn failure(duration_ms: u64, error: impl Into<String>) -> Self {
        Self {
            duration_ms,
            error: error.into(),
            ..Self::default()
        }
    }
}

/// Links and visible text produced by one HTML parse pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPage {
    /// Normalized absolute links, deduplicated, in document order
    pub links: Vec<String>,
    /// Visible text joined with single spaces
    pub text: String,
}

/// Blob store keys written by a successful archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveKeys {
    pub raw_key: String,
    pub text_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            UrlStatus::Queued,
            UrlStatus::Processing,
            UrlStatus::Done,
            UrlStatus::Failed,
            UrlStatus::RobotsBlocked,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            let back: UrlStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(UrlStatus::Done.is_terminal());
        assert!(UrlStatus::Failed.is_terminal());
        assert!(UrlStatus::RobotsBlocked.is_terminal());
        assert!(!UrlStatus::Queued.is_terminal());
        assert!(!UrlStatus::Processing.is_terminal());
    }

    #[test]
    fn test_fetch_result_failure() {
        let result = FetchResult::failure(42, "SSRF blocked: private IP");
        assert!(!result.success);
        assert_eq!(result.status_code, 0);
        assert_eq!(result.duration_ms, 42);
        assert!(result.error.contains("SSRF"));
        assert!(result.body.is_empty());
    }
}

//! HTTP fetcher with SSRF-safe transport
//!
//! One client is built at startup: no redirect following (a 3xx is a
//! terminal response of the initial URL), a 10 second total timeout, the
//! configured User-Agent on every request, and the SSRF resolver installed
//! so connections can only reach vetted addresses. `fetch` never returns an
//! error type; failures are carried inside [`FetchResult`] so the pipeline
//! can classify them.

use std::time::{Duration, Instant};

use reqwest::{redirect, Client};
use url::Url;

use crate::crawler::ssrf::{self, SsrfResolver};
use crate::models::FetchResult;

/// Cap on bytes read from a page body; longer bodies are truncated.
pub const MAX_BODY_SIZE: u64 = 10 * 1024 * 1024;

/// Total per-request timeout enforced by the client.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP status codes whose retry is certain to yield the same result. Any
/// other non-success (5xx, 429, zero status) is worth redelivering.
pub fn is_permanent_http(status: u16) -> bool {
    matches!(status, 400 | 401 | 403 | 404 | 405 | 410 | 414 | 451)
}

/// Page fetcher sharing one configured HTTP client
pub struct Fetcher {
    client: Client,
    /// Early host validation before the request is built; the DNS resolver
    /// in the client enforces the same ranges at connect time.
    guard: bool,
}

impl Fetcher {
    /// Create a fetcher with the full SSRF guard and default timeout.
    ///
    /// # Errors
    ///
    /// Returns the underlying client build error.
    pub fn new(user_agent: &str) -> Result<Self, reqwest::Error> {
        Self::build(user_agent, FETCH_TIMEOUT, true)
    }

    /// Create a fetcher with a custom timeout.
    pub fn with_timeout(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::build(user_agent, timeout, true)
    }

    /// Create a fetcher without the SSRF guard. Only for tests that target
    /// loopback servers; production construction always guards.
    pub fn unguarded(user_agent: &str) -> Result<Self, reqwest::Error> {
        Self::build(user_agent, FETCH_TIMEOUT, false)
    }

    /// Unguarded fetcher with a custom timeout, for timeout tests against
    /// loopback servers.
    pub fn unguarded_with_timeout(
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Self::build(user_agent, timeout, false)
    }

    fn build(user_agent: &str, timeout: Duration, guard: bool) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder()
            .user_agent(user_agent)
            .redirect(redirect::Policy::none())
            .timeout(timeout);
        if guard {
            builder = builder.dns_resolver(SsrfResolver::shared());
        }
        Ok(Self {
            client: builder.build()?,
            guard,
        })
    }

    /// Fetch a page body, capped at [`MAX_BODY_SIZE`].
    pub async fn fetch(&self, target: &str) -> FetchResult {
        self.fetch_with_limit(target, MAX_BODY_SIZE).await
    }

    /// Fetch with an explicit body cap. The robots.txt path uses a smaller
    /// cap than page fetches.
    pub(crate) async fn fetch_with_limit(&self, target: &str, limit: u64) -> FetchResult {
        let start = Instant::now();

        let parsed = match Url::parse(target) {
            Ok(u) => u,
            Err(err) => {
                return FetchResult::failure(elapsed_ms(start), format!("invalid request: {err}"))
            }
        };

        if self.guard {
            let host = parsed.host_str().unwrap_or_default();
            if let Err(err) = ssrf::validate_host(host).await {
                return FetchResult::failure(elapsed_ms(start), err.to_string());
            }
        }

        let response = match self.client.get(target).send().await {
            Ok(r) => r,
            Err(err) => return FetchResult::failure(elapsed_ms(start), error_chain(&err)),
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let mut body: Vec<u8> = Vec::new();
        let mut response = response;
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    let remaining = (limit as usize).saturating_sub(body.len());
                    if chunk.len() >= remaining {
                        body.extend_from_slice(&chunk[..remaining]);
                        break;
                    }
                    body.extend_from_slice(&chunk);
                }
                Ok(None) => break,
                Err(err) => {
                    return FetchResult {
                        success: false,
                        status_code: status,
                        content_type,
                        duration_ms: elapsed_ms(start),
                        error: format!("read error: {}", error_chain(&err)),
                        ..FetchResult::default()
                    }
                }
            }
        }

        FetchResult {
            success: (200..400).contains(&status),
            status_code: status,
            content_length: body.len() as u64,
            content_type,
            duration_ms: elapsed_ms(start),
            error: String::new(),
            body,
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Join an error with its source chain. reqwest wraps connect and resolver
/// errors, and only the chain contains the SSRF marker higher layers look
/// for.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(s) = source {
        message.push_str(": ");
        message.push_str(&s.to_string());
        source = s.source();
    }
    message
}

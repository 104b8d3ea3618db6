//! The crawl pipeline and its collaborating parts
//!
//! [`pipeline::Crawler`] is the per-message orchestrator; the sibling
//! modules supply the fetcher, robots cache, rate limiter, SSRF guard and
//! URL identity helpers it composes.

pub mod fetcher;
pub mod pipeline;
pub mod ratelimit;
pub mod robots;
pub mod ssrf;
pub mod url;

pub use fetcher::Fetcher;
pub use pipeline::Crawler;
pub use ratelimit::DomainRateLimiter;
pub use robots::RobotsCache;

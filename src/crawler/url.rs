//! URL identity and host policy
//!
//! Stable hashing for state store keys, host extraction, and the
//! normalization applied to every discovered href before it may enter the
//! crawl frontier.

use sha2::{Digest, Sha256};
use url::Url;

/// Stable identity of a URL: SHA-256 of the exact string, rendered as 64
/// lowercase hex characters. Used as the state store partition key.
///
/// # Examples
///
/// ```
/// use trawler::crawler::url::hash;
///
/// let h = hash("https://example.com/");
/// assert_eq!(h.len(), 64);
/// assert_eq!(h, hash("https://example.com/"));
/// ```
pub fn hash(u: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(u.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Extract the host (with any explicit port) from a URL, or empty string on
/// parse error. Hosts on non-default ports are distinct allowlist entries.
pub fn host(url_str: &str) -> String {
    match Url::parse(url_str) {
        Ok(parsed) => match (parsed.host_str(), parsed.port()) {
            (Some(h), Some(p)) => format!("{h}:{p}"),
            (Some(h), None) => h.to_string(),
            _ => String::new(),
        },
        Err(_) => String::new(),
    }
}

/// Extract `<scheme>://<host>` (with any explicit port) from a URL, or empty
/// string on parse error. This is the key the per-domain rate limiter and
/// robots cache operate on.
pub fn scheme_and_host(url_str: &str) -> String {
    match Url::parse(url_str) {
        Ok(parsed) => match parsed.host_str() {
            Some(h) => match parsed.port() {
                Some(p) => format!("{}://{}:{}", parsed.scheme(), h, p),
                None => format!("{}://{}", parsed.scheme(), h),
            },
            None => String::new(),
        },
        Err(_) => String::new(),
    }
}

/// Convert a potentially relative href to an absolute crawlable URL.
/// Returns empty string for URLs we don't want to crawl.
///
/// Rejected: empty or whitespace-only hrefs, fragment-only hrefs, and the
/// javascript/mailto/tel/data schemes. Relative references are resolved
/// against `base`; anything that does not resolve to http or https is
/// dropped, and the fragment is stripped from what remains.
pub fn normalize(href: &str, base: &Url) -> String {
    let href = href.trim();

    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return String::new();
    }

    // Resolve relative references against the base
    let mut resolved = match base.join(href) {
        Ok(u) => u,
        Err(_) => return String::new(),
    };

    // Only keep http/https
    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return String::new();
    }

    // Remove fragment
    resolved.set_fragment(None);

    // No same-origin filter here: domain membership is enforced later via
    // the allowlist during fan-out.

    resolved.to_string()
}

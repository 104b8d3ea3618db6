//! SSRF guard: is this endpoint safe to contact?
//!
//! The guard is applied at two points. [`validate_host`] gives cheap early
//! rejection before any HTTP work: literal IPs are checked directly and
//! hostnames are resolved and checked. [`SsrfResolver`] is installed as the
//! HTTP client's DNS resolver, so the connection can only ever reach
//! addresses that passed the check — this closes the DNS-rebinding window
//! between early validation and the actual connect. Early rejection is
//! defense in depth; the resolver is the real barrier.
//!
//! Every rejection message contains the substring `SSRF` so higher layers
//! and tests can classify these failures.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use thiserror::Error;

/// SSRF rejection reasons. Display output always contains `SSRF`.
#[derive(Error, Debug)]
pub enum SsrfError {
    #[error("SSRF blocked: private IP {0}")]
    PrivateIp(IpAddr),

    #[error("SSRF blocked: {host} resolves to private IP {ip}")]
    ResolvesToPrivate { host: String, ip: IpAddr },

    #[error("SSRF check: DNS lookup failed for {host}: {source}")]
    Lookup {
        host: String,
        #[source]
        source: std::io::Error,
    },
}

/// Check whether an IP belongs to a range the crawler must never contact:
/// loopback, RFC-1918 private, link-local unicast/multicast, IPv6
/// unique-local, or the unspecified address.
pub fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => {
            // IPv4-mapped addresses hide the real target behind ::ffff:a.b.c.d
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_private_v4(mapped);
            }
            is_private_v6(v6)
        }
    }
}

fn is_private_v4(ip: Ipv4Addr) -> bool {
    if ip.is_loopback() || ip.is_private() || ip.is_link_local() || ip.is_unspecified() {
        return true;
    }
    // Link-local multicast, 224.0.0.0/24
    let octets = ip.octets();
    octets[0] == 224 && octets[1] == 0 && octets[2] == 0
}

fn is_private_v6(ip: Ipv6Addr) -> bool {
    if ip.is_loopback() || ip.is_unspecified() {
        return true;
    }
    let seg = ip.segments();
    // fe80::/10 link-local unicast
    if seg[0] & 0xffc0 == 0xfe80 {
        return true;
    }
    // ff02::/16 link-local multicast
    if seg[0] == 0xff02 {
        return true;
    }
    // fc00::/7 unique local
    seg[0] & 0xfe00 == 0xfc00
}

/// Early rejection: validate a URL host before the HTTP layer touches it.
///
/// Literal IPs are checked directly; hostnames are resolved and rejected if
/// any resolved address falls in a private range. This blocks the obvious
/// cases (cloud metadata endpoints, localhost, internal networks) cheaply,
/// before a request is even built.
pub async fn validate_host(host: &str) -> Result<(), SsrfError> {
    // Literal IPs never hit DNS. Bracketed IPv6 literals come through with
    // the brackets still on when taken from a URL authority.
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = bare.parse::<IpAddr>() {
        if is_private_ip(ip) {
            return Err(SsrfError::PrivateIp(ip));
        }
        return Ok(());
    }

    let addrs = tokio::net::lookup_host((host, 0))
        .await
        .map_err(|source| SsrfError::Lookup {
            host: host.to_string(),
            source,
        })?;

    for addr in addrs {
        if is_private_ip(addr.ip()) {
            return Err(SsrfError::ResolvesToPrivate {
                host: host.to_string(),
                ip: addr.ip(),
            });
        }
    }

    Ok(())
}

/// DNS resolver that refuses to hand private addresses to the HTTP client.
///
/// The client connects only to addresses returned from here, so a hostname
/// whose records change between early validation and connect time still
/// cannot reach an internal endpoint.
#[derive(Debug, Default, Clone)]
pub struct SsrfResolver;

impl SsrfResolver {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self)
    }
}

impl Resolve for SsrfResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let host = name.as_str().to_string();
        Box::pin(async move {
            let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
                .await
                .map_err(|source| SsrfError::Lookup {
                    host: host.clone(),
                    source,
                })?
                .collect();

            if let Some(private) = addrs.iter().find(|a| is_private_ip(a.ip())) {
                return Err(SsrfError::ResolvesToPrivate {
                    host,
                    ip: private.ip(),
                }
                .into());
            }

            Ok(Box::new(addrs.into_iter()) as Addrs)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_private_v4_ranges() {
        for ip in [
            "127.0.0.1",
            "127.255.255.254",
            "10.0.0.1",
            "10.255.0.1",
            "172.16.0.1",
            "172.31.255.255",
            "192.168.1.1",
            "169.254.169.254",
            "224.0.0.251",
            "0.0.0.0",
        ] {
            let ip: IpAddr = ip.parse().unwrap();
            assert!(is_private_ip(ip), "{ip} should be blocked");
        }
    }

    #[test]
    fn test_blocks_private_v6_ranges() {
        for ip in ["::1", "::", "fe80::1", "ff02::1", "fc00::1", "fd12:3456::1"] {
            let ip: IpAddr = ip.parse().unwrap();
            assert!(is_private_ip(ip), "{ip} should be blocked");
        }
    }

    #[test]
    fn test_blocks_v4_mapped_v6() {
        let ip: IpAddr = "::ffff:127.0.0.1".parse().unwrap();
        assert!(is_private_ip(ip));
        let ip: IpAddr = "::ffff:10.0.0.1".parse().unwrap();
        assert!(is_private_ip(ip));
    }

    #[test]
    fn test_allows_public_addresses() {
        for ip in ["8.8.8.8", "93.184.216.34", "172.32.0.1", "2606:2800:220:1::1"] {
            let ip: IpAddr = ip.parse().unwrap();
            assert!(!is_private_ip(ip), "{ip} should be allowed");
        }
    }

    #[tokio::test]
    async fn test_validate_host_literal_ip() {
        let err = validate_host("127.0.0.1").await.unwrap_err();
        assert!(err.to_string().contains("SSRF"));

        let err = validate_host("[::1]").await.unwrap_err();
        assert!(err.to_string().contains("SSRF"));

        assert!(validate_host("8.8.8.8").await.is_ok());
    }

    #[tokio::test]
    async fn test_validate_host_resolving_name() {
        // localhost resolves to loopback on every sane system
        let err = validate_host("localhost").await.unwrap_err();
        assert!(err.to_string().contains("SSRF"));
    }
}

//! Direct-vs-upstream routing policy.
//!
//! A destination whose first resolved address is private or loopback is
//! reached directly; everything else, including hosts that failed to
//! resolve, is relayed through the upstream proxy.
//!
//! Only the first address is inspected. A host publishing both private and
//! public records is routed by whichever the resolver lists first, so the
//! decision can change between lookups if answer order changes.

use crate::upstream::UpstreamConfig;
use ipnet::IpNet;
use std::net::IpAddr;
use url::Url;

/// Routing verdict for a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDecision {
    /// Connect to the destination without an upstream proxy
    Direct,
    /// Relay through the upstream proxy at this URL (credentials embedded)
    ViaUpstream(Url),
}

impl RoutingDecision {
    #[must_use]
    pub fn is_direct(&self) -> bool {
        matches!(self, RoutingDecision::Direct)
    }

    /// Upstream URL, if the request is relayed.
    #[must_use]
    pub fn upstream_url(&self) -> Option<&Url> {
        match self {
            RoutingDecision::Direct => None,
            RoutingDecision::ViaUpstream(url) => Some(url),
        }
    }

    /// Short label for logs. Never includes credentials.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            RoutingDecision::Direct => "direct",
            RoutingDecision::ViaUpstream(_) => "upstream",
        }
    }
}

/// Private-use and loopback ranges (RFC1918, RFC4193, loopback).
fn local_networks() -> Vec<IpNet> {
    // Well-known literals; a parse failure would be a programming error.
    let ranges = [
        "10.0.0.0/8",
        "172.16.0.0/12",
        "192.168.0.0/16",
        "127.0.0.0/8",
        "fc00::/7",
        "::1/128",
    ];
    ranges
        .iter()
        .filter_map(|s| s.parse::<IpNet>().ok())
        .collect()
}

/// Whether `ip` is a private-range or loopback address.
///
/// IPv4-mapped IPv6 addresses are judged by their IPv4 form. Link-local,
/// CGNAT and other special ranges are not local for routing purposes.
#[must_use]
pub fn is_local_address(ip: &IpAddr) -> bool {
    let ip = ip.to_canonical();
    local_networks().iter().any(|net| net.contains(&ip))
}

/// Decide routing from the resolved addresses of a destination.
///
/// `resolved` is the resolver's answer in order. An empty slice (lookup
/// failed or returned nothing) routes via the upstream.
#[must_use]
pub fn decide(resolved: &[IpAddr], upstream: &UpstreamConfig) -> RoutingDecision {
    match resolved.first() {
        Some(ip) if is_local_address(ip) => RoutingDecision::Direct,
        _ => RoutingDecision::ViaUpstream(upstream.proxy_url()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn upstream() -> UpstreamConfig {
        UpstreamConfig::new("proxy.example.com:3128", "alice", "s3cret").unwrap()
    }

    fn v4(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(a, b, c, d))
    }

    #[test]
    fn test_private_ranges_are_local() {
        assert!(is_local_address(&v4(10, 0, 0, 1)));
        assert!(is_local_address(&v4(172, 16, 0, 1)));
        assert!(is_local_address(&v4(172, 31, 255, 255)));
        assert!(is_local_address(&v4(192, 168, 1, 1)));
        assert!(is_local_address(&IpAddr::V6(Ipv6Addr::new(
            0xfd12, 0, 0, 0, 0, 0, 0, 1
        ))));
    }

    #[test]
    fn test_loopback_is_local() {
        assert!(is_local_address(&v4(127, 0, 0, 1)));
        assert!(is_local_address(&v4(127, 255, 0, 9)));
        assert!(is_local_address(&IpAddr::V6(Ipv6Addr::LOCALHOST)));
    }

    #[test]
    fn test_public_and_special_ranges_are_not_local() {
        assert!(!is_local_address(&v4(8, 8, 8, 8)));
        assert!(!is_local_address(&v4(172, 15, 255, 255)));
        assert!(!is_local_address(&v4(172, 32, 0, 1)));
        assert!(!is_local_address(&v4(169, 254, 1, 1)));
        assert!(!is_local_address(&v4(100, 64, 0, 1)));
        assert!(!is_local_address(&IpAddr::V6(Ipv6Addr::new(
            0x2001, 0x4860, 0, 0, 0, 0, 0, 0x8888
        ))));
    }

    #[test]
    fn test_ipv4_mapped_private_is_local() {
        let mapped = IpAddr::V6(Ipv4Addr::new(192, 168, 0, 10).to_ipv6_mapped());
        assert!(is_local_address(&mapped));
    }

    #[test]
    fn test_decide_private_first_is_direct() {
        let decision = decide(&[v4(192, 168, 1, 20)], &upstream());
        assert_eq!(decision, RoutingDecision::Direct);
        assert!(decision.upstream_url().is_none());
    }

    #[test]
    fn test_decide_public_first_is_upstream() {
        let decision = decide(&[v4(93, 184, 216, 34)], &upstream());
        let url = decision.upstream_url().unwrap();
        assert_eq!(url.host_str(), Some("proxy.example.com"));
        assert_eq!(url.port(), Some(3128));
        assert_eq!(url.username(), "alice");
        assert_eq!(url.password(), Some("s3cret"));
    }

    #[test]
    fn test_decide_empty_is_upstream() {
        let decision = decide(&[], &upstream());
        assert_eq!(decision.label(), "upstream");
    }

    #[test]
    fn test_decide_inspects_only_first_address() {
        let cfg = upstream();
        let public_first = decide(&[v4(8, 8, 8, 8), v4(10, 0, 0, 1)], &cfg);
        assert!(!public_first.is_direct());

        let private_first = decide(&[v4(10, 0, 0, 1), v4(8, 8, 8, 8)], &cfg);
        assert!(private_first.is_direct());
    }

    #[test]
    fn test_decide_is_stable() {
        let cfg = upstream();
        let ips = [v4(1, 1, 1, 1)];
        assert_eq!(decide(&ips, &cfg), decide(&ips, &cfg));
    }
}

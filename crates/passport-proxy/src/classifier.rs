//! Destination classifier: resolves a host and picks direct vs upstream.
//!
//! Performs DNS resolution via `tokio::net::lookup_host()` and hands the
//! ordered answer to [`passport::routing::decide`]. Resolution failures are
//! logged and treated as "external", so a broken resolver degrades to
//! relaying through the upstream rather than failing the request.

use crate::engine::RouteResolver;
use crate::error::{ProxyError, Result};
use crate::timeout;
use passport::routing;
use passport::{RoutingDecision, UpstreamConfig};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Per-request routing policy for plain HTTP traffic.
#[derive(Debug, Clone)]
pub struct DestinationClassifier {
    upstream: Arc<UpstreamConfig>,
    resolve_timeout: Option<Duration>,
}

impl DestinationClassifier {
    #[must_use]
    pub fn new(upstream: Arc<UpstreamConfig>, resolve_timeout: Option<Duration>) -> Self {
        Self {
            upstream,
            resolve_timeout,
        }
    }

    /// Classify `host` (no port).
    ///
    /// Never fails: an unresolvable host routes via the upstream.
    pub async fn classify(&self, host: &str) -> RoutingDecision {
        debug!("Proxy check: {}", host);
        let resolved = match self.lookup(host).await {
            Ok(ips) if ips.is_empty() => {
                info!("Lookup result empty for {}, routing via upstream", host);
                Vec::new()
            }
            Ok(ips) => ips,
            Err(e) => {
                info!("Failed to lookup {}: {}, routing via upstream", host, e);
                Vec::new()
            }
        };
        routing::decide(&resolved, &self.upstream)
    }

    /// Resolve `host` to its addresses, in resolver order.
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>> {
        let host = strip_brackets(host);
        timeout::within(self.resolve_timeout, "DNS lookup", async {
            let addrs = tokio::net::lookup_host((host, 0))
                .await
                .map_err(ProxyError::from)?;
            Ok(addrs.map(|addr| addr.ip()).collect())
        })
        .await
    }
}

impl RouteResolver for DestinationClassifier {
    async fn resolve(&self, host: &str) -> RoutingDecision {
        self.classify(host).await
    }
}

/// `[::1]` -> `::1`; other hosts unchanged.
fn strip_brackets(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}

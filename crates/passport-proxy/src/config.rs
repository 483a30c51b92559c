//! Proxy configuration.
//!
//! A [`ProxyConfig`] is built once at startup and never mutated. The server
//! wraps the pieces it shares between connections in `Arc`.

use passport::access;
use passport::{AccessList, UpstreamConfig};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

/// Port the relay listens on unless overridden.
pub const DEFAULT_PORT: u16 = 11611;

/// Configuration for the relay server.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Authenticated upstream proxy for external destinations.
    pub upstream: Arc<UpstreamConfig>,

    /// Source allowlist. `None` allows every source and keeps the listener
    /// on loopback.
    pub access_list: Option<Arc<AccessList>>,

    /// Bind port (0 = OS-assigned ephemeral port)
    pub bind_port: u16,

    /// Deadline for DNS resolution in the classifier. `None` waits forever.
    pub resolve_timeout: Option<Duration>,

    /// Deadline for dialing a destination or completing the upstream CONNECT
    /// handshake. `None` waits forever.
    pub connect_timeout: Option<Duration>,
}

impl ProxyConfig {
    /// Configuration with no access list, the default port and no timeouts.
    #[must_use]
    pub fn new(upstream: UpstreamConfig) -> Self {
        Self {
            upstream: Arc::new(upstream),
            access_list: None,
            bind_port: DEFAULT_PORT,
            resolve_timeout: None,
            connect_timeout: None,
        }
    }

    #[must_use]
    pub fn with_access_list(mut self, access_list: Option<AccessList>) -> Self {
        self.access_list = access_list.map(Arc::new);
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.bind_port = port;
        self
    }

    /// Interface chosen by the bind-address policy.
    #[must_use]
    pub fn bind_addr(&self) -> IpAddr {
        access::bind_addr(self.access_list.as_deref())
    }

    /// Full listen address.
    #[must_use]
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr(), self.bind_port)
    }
}

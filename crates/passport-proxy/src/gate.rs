//! Access control gate.
//!
//! Every accepted connection passes through [`AccessGate`] before the engine
//! sees it. A rejected client gets `400` with a fixed body and the
//! connection is closed; nothing is forwarded.

use crate::audit;
use crate::error::Result;
use crate::http::{self, ReadHead};
use crate::timeout;
use passport::access;
use passport::AccessList;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

/// Body of the response sent to rejected sources.
pub const DENIED_BODY: &str = "ProxyPassport: Access denied";

/// How long a denied peer gets to finish sending its request head.
const DENIED_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Source-address gate in front of the engine.
#[derive(Debug, Clone)]
pub struct AccessGate {
    access: Option<Arc<AccessList>>,
    drain_timeout: Duration,
}

impl Default for AccessGate {
    fn default() -> Self {
        Self::new(None)
    }
}

impl AccessGate {
    /// `None` admits every source.
    #[must_use]
    pub fn new(access: Option<Arc<AccessList>>) -> Self {
        Self {
            access,
            drain_timeout: DENIED_DRAIN_TIMEOUT,
        }
    }

    /// Override how long [`AccessGate::reject`] waits for a denied head.
    #[must_use]
    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    /// Whether the connection from `peer` may proceed.
    #[must_use]
    pub fn admits(&self, peer: &SocketAddr) -> bool {
        self.admits_raw(&peer.to_string())
    }

    /// Whether a peer given as raw `ip:port` text may proceed.
    #[must_use]
    pub fn admits_raw(&self, raw_remote: &str) -> bool {
        access::is_authorized(self.access.as_deref(), raw_remote)
    }

    /// Answer a rejected connection with `400` and [`DENIED_BODY`].
    ///
    /// The request head is drained first (best effort, bounded by
    /// [`http::MAX_HEADER_SIZE`] and the drain timeout) so the client reads
    /// the response instead of a reset.
    pub async fn reject<S>(&self, stream: &mut S, peer: &SocketAddr) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        audit::log_access_denied(peer);
        let drained = timeout::within(
            Some(self.drain_timeout),
            "drain denied request",
            http::read_request_head(stream),
        )
        .await;
        match drained {
            Ok(ReadHead::Closed) => return Ok(()),
            Ok(_) => {}
            Err(e) => debug!("Unreadable request from denied peer {}: {}", peer, e),
        }
        http::send_text(stream, 400, "Bad Request", DENIED_BODY).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn gate(raw: &str) -> AccessGate {
        AccessGate::new(AccessList::parse(raw).unwrap().map(Arc::new))
    }

    #[test]
    fn test_listed_source_admitted() {
        let gate = gate("10.0.0.0/8");
        assert!(gate.admits_raw("10.1.2.3:5555"));
        assert!(gate.admits(&"10.1.2.3:5555".parse().unwrap()));
    }

    #[test]
    fn test_unlisted_source_rejected() {
        let gate = gate("10.0.0.0/8");
        assert!(!gate.admits_raw("8.8.8.8:1234"));
        assert!(!gate.admits(&"8.8.8.8:1234".parse().unwrap()));
    }

    #[test]
    fn test_no_access_list_admits_all() {
        let gate = AccessGate::default();
        assert!(gate.admits_raw("8.8.8.8:1234"));
        assert!(gate.admits(&"[2001:db8::1]:443".parse().unwrap()));
    }

    #[test]
    fn test_ipv6_peer_formatting() {
        let gate = gate("2001:db8::/32");
        assert!(gate.admits(&"[2001:db8::1]:443".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_reject_writes_denial() {
        let gate = gate("10.0.0.0/8");
        let peer: SocketAddr = "8.8.8.8:1234".parse().unwrap();
        let (mut client, mut server) = tokio::io::duplex(4096);

        client
            .write_all(b"GET http://example.com/ HTTP/1.1\r\nHost: example.com\r\n\r\n")
            .await
            .unwrap();
        gate.reject(&mut server, &peer).await.unwrap();
        drop(server);

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        let text = String::from_utf8(response).unwrap();
        assert!(text.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(text.ends_with("\r\n\r\nProxyPassport: Access denied"));
    }

    #[tokio::test]
    async fn test_reject_oversized_head_without_newline() {
        let gate = gate("10.0.0.0/8");
        let peer: SocketAddr = "8.8.8.8:1234".parse().unwrap();
        let (mut client, mut server) = tokio::io::duplex(256 * 1024);

        client
            .write_all(&vec![b'a'; http::MAX_HEADER_SIZE + 4096])
            .await
            .unwrap();
        gate.reject(&mut server, &peer).await.unwrap();
        drop(server);

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        assert!(response.starts_with(b"HTTP/1.1 400 Bad Request\r\n"));
    }

    #[tokio::test]
    async fn test_reject_silent_peer_after_drain_timeout() {
        let gate = gate("10.0.0.0/8").with_drain_timeout(Duration::from_millis(50));
        let peer: SocketAddr = "8.8.8.8:1234".parse().unwrap();
        let (mut client, mut server) = tokio::io::duplex(4096);

        tokio::time::timeout(Duration::from_secs(5), gate.reject(&mut server, &peer))
            .await
            .unwrap()
            .unwrap();
        drop(server);

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        let text = String::from_utf8(response).unwrap();
        assert!(text.ends_with("ProxyPassport: Access denied"));
    }
}

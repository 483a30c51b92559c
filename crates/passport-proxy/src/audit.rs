//! Audit logging for relay decisions.
//!
//! Logs access-gate verdicts, routing decisions and tunnel outcomes with
//! structured fields via `tracing`. Credentials, authorization headers and
//! upstream URLs with userinfo are never included.

use passport::RoutingDecision;
use std::net::SocketAddr;
use tracing::{info, warn};

/// Kind of request being relayed.
#[derive(Debug, Clone, Copy)]
pub enum RequestKind {
    /// Plain HTTP request in absolute-form
    Http,
    /// CONNECT tunnel
    Connect,
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestKind::Http => write!(f, "http"),
            RequestKind::Connect => write!(f, "connect"),
        }
    }
}

/// Log a connection rejected by the access gate.
pub fn log_access_denied(peer: &SocketAddr) {
    warn!(
        target: "passport_proxy::audit",
        peer = %peer,
        decision = "deny",
        "source address not in access list"
    );
}

/// Log the routing decision for a plain HTTP request.
pub fn log_routed(host: &str, port: u16, method: &str, decision: &RoutingDecision) {
    info!(
        target: "passport_proxy::audit",
        kind = %RequestKind::Http,
        host = host,
        port = port,
        method = method,
        route = decision.label(),
        "request routed"
    );
}

/// Log an established CONNECT tunnel.
pub fn log_tunnel_established(target: &str) {
    info!(
        target: "passport_proxy::audit",
        kind = %RequestKind::Connect,
        destination = target,
        route = "upstream",
        "tunnel established"
    );
}

/// Log a relay failure surfaced to the client as a gateway error.
pub fn log_relay_failed(kind: RequestKind, target: &str, reason: &str) {
    warn!(
        target: "passport_proxy::audit",
        kind = %kind,
        destination = target,
        reason = reason,
        "relay failed"
    );
}

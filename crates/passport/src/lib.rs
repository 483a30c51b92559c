//! Routing and access-control policy for the ProxyPassport relay.
//!
//! This crate holds the synchronous, I/O-free half of the relay:
//!
//! - [`AccessList`]: the CIDR allowlist that gates inbound connections,
//!   plus the bind-address policy derived from it.
//! - [`UpstreamConfig`]: the authenticated upstream proxy that external
//!   traffic is relayed through.
//! - [`RoutingDecision`]: the per-request "direct or via upstream" verdict,
//!   decided from the first resolved address of the destination.
//!
//! DNS resolution, dialing and the HTTP engine live in `passport-proxy`.

pub mod access;
pub mod error;
pub mod routing;
pub mod upstream;

pub use access::AccessList;
pub use error::{PassportError, Result};
pub use routing::RoutingDecision;
pub use upstream::{UpstreamConfig, UpstreamSettings};

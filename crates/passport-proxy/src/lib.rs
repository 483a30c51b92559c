//! Selective forward proxy for the ProxyPassport relay.
//!
//! `passport-proxy` accepts HTTP and CONNECT traffic and routes each request
//! one of two ways:
//!
//! 1. **Direct** - plain HTTP to a host whose first resolved address is
//!    private or loopback is sent straight to the destination.
//!
//! 2. **Via upstream** - everything else is relayed through one
//!    authenticated upstream proxy. CONNECT requests always take this path;
//!    the relay performs the `Proxy-Authorization: Basic` handshake itself
//!    and then passes the tunnel bytes through untouched.
//!
//! An [`AccessGate`](gate::AccessGate) in front of the engine rejects
//! sources outside the configured CIDR allowlist with a fixed `400`.

pub mod audit;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod http;
pub mod server;
mod timeout;
pub mod tunnel;

pub use config::{ProxyConfig, DEFAULT_PORT};
pub use engine::{ConnectDialer, ProxyEngine, RouteResolver, TunnelResult};
pub use error::{ProxyError, Result};
pub use server::{start, ProxyHandle};

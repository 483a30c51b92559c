//! Error types for the passport-proxy crate.

use thiserror::Error;

/// Errors that can occur in the relay.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Proxy bind failed on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Upstream connection failed to {host}: {reason}")]
    UpstreamConnect { host: String, reason: String },

    #[error("Upstream proxy refused CONNECT to {target} with status {status}: {detail}")]
    TunnelRejected {
        target: String,
        status: u16,
        detail: String,
    },

    #[error("Upstream proxy handshake failed for {target}: {reason}")]
    TunnelHandshake { target: String, reason: String },

    #[error("Timed out after {secs:.1}s: {operation}")]
    Timeout { operation: String, secs: f64 },

    #[error("HTTP parse error: {0}")]
    HttpParse(String),

    #[error("Configuration error: {0}")]
    Config(#[from] passport::PassportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for proxy operations.
pub type Result<T> = std::result::Result<T, ProxyError>;

//! Error types for the passport policy crate.

use thiserror::Error;

/// Errors raised while building policy objects at startup.
#[derive(Error, Debug)]
pub enum PassportError {
    #[error("Invalid ACL entry {entry:?}: {reason}")]
    InvalidCidr { entry: String, reason: String },

    #[error("Invalid upstream proxy address {host:?}: {reason}")]
    InvalidUpstream { host: String, reason: String },
}

/// Result type alias for policy operations.
pub type Result<T> = std::result::Result<T, PassportError>;

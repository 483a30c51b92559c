//! Error types for the proxypassport binary.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal startup and runtime errors.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to read config {path:?}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path:?}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Policy(#[from] passport::PassportError),

    #[error("{0}")]
    Proxy(#[from] passport_proxy::ProxyError),

    #[error("Runtime error: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Result type alias for the binary.
pub type Result<T> = std::result::Result<T, CliError>;

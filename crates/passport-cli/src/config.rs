//! Startup configuration for proxypassport
//!
//! The upstream proxy is described by a JSON file:
//!
//! ```json
//! { "host": "proxy.example.com:3128", "username": "alice", "password": "..." }
//! ```
//!
//! Optional `resolve_timeout_secs` and `connect_timeout_secs` put deadlines
//! on DNS lookups and dials; absent or `0` means no deadline. The access
//! list comes from the command line or `PROXYPASSPORT_ALLOW`.

use crate::error::{CliError, Result};
use passport::{AccessList, UpstreamConfig, UpstreamSettings};
use passport_proxy::ProxyConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Contents of the configuration file.
#[derive(Debug, Deserialize)]
pub struct FileConfig {
    #[serde(flatten)]
    pub upstream: UpstreamSettings,

    /// DNS lookup deadline in seconds (0 or absent = none)
    #[serde(default)]
    pub resolve_timeout_secs: Option<u64>,

    /// Dial and CONNECT handshake deadline in seconds (0 or absent = none)
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
}

/// Read and parse the configuration file at `path`.
pub fn load(path: &Path) -> Result<FileConfig> {
    let raw = std::fs::read_to_string(path).map_err(|e| CliError::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let config: FileConfig = serde_json::from_str(&raw).map_err(|e| CliError::ConfigParse {
        path: path.to_path_buf(),
        source: e,
    })?;
    debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Combine the file, the raw access list and the port into a relay config.
pub fn build(file: &FileConfig, allow: Option<&str>, port: u16) -> Result<ProxyConfig> {
    let upstream = UpstreamConfig::from_settings(&file.upstream)?;
    let access_list = match allow {
        Some(raw) => AccessList::parse(raw)?,
        None => None,
    };

    let mut config = ProxyConfig::new(upstream)
        .with_access_list(access_list)
        .with_port(port);
    config.resolve_timeout = seconds(file.resolve_timeout_secs);
    config.connect_timeout = seconds(file.connect_timeout_secs);
    Ok(config)
}

fn seconds(value: Option<u64>) -> Option<Duration> {
    value.filter(|s| *s > 0).map(Duration::from_secs)
}

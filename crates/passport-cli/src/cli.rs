//! CLI argument definitions for proxypassport
//!
//! Uses clap for argument parsing. Every option can also come from the
//! environment, which is how container deployments configure the relay.

use clap::Parser;
use passport_proxy::DEFAULT_PORT;
use std::path::PathBuf;

/// proxypassport - selective forward proxy
///
/// Sends traffic for private and loopback destinations directly and relays
/// everything else, including every CONNECT tunnel, through one
/// authenticated upstream proxy.
#[derive(Parser, Debug)]
#[command(name = "proxypassport")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Loopback-only relay using ./config.json
    proxypassport

    # Serve a private network (binds 0.0.0.0)
    PROXYPASSPORT_ALLOW='10.0.0.0/8;192.168.0.0/16' proxypassport

    # Verbose logging
    RUST_LOG=debug proxypassport --config /etc/proxypassport.json
")]
pub struct Cli {
    /// Upstream proxy configuration (JSON with host, username, password)
    #[arg(
        long,
        short = 'c',
        value_name = "FILE",
        default_value = "config.json",
        env = "PROXYPASSPORT_CONFIG"
    )]
    pub config: PathBuf,

    /// Semicolon-separated CIDR allowlist of client networks.
    /// When set, the relay listens on all interfaces; otherwise loopback only.
    #[arg(long, value_name = "CIDRS", env = "PROXYPASSPORT_ALLOW")]
    pub allow: Option<String>,

    /// Port to listen on
    #[arg(long, short = 'p', value_name = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

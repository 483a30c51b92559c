//! proxypassport - selective forward proxy relay
//!
//! Loads the upstream proxy configuration and the client access list, then
//! runs the relay until interrupted.

mod cli;
mod config;
mod error;

use clap::Parser;
use cli::Cli;
use error::{CliError, Result};
use passport_proxy::ProxyConfig;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    if let Err(e) = run() {
        error!("{}", e);
        eprintln!("proxypassport: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let file = config::load(&cli.config)?;
    let proxy_config = config::build(&file, cli.allow.as_deref(), cli.port)?;
    drop(file);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    runtime.block_on(serve(proxy_config))
}

/// Run the relay until Ctrl-C.
async fn serve(config: ProxyConfig) -> Result<()> {
    let handle = passport_proxy::start(config).await?;
    info!("proxypassport ready on port {}", handle.port());

    tokio::signal::ctrl_c().await.map_err(CliError::Runtime)?;
    info!("Interrupt received, stopping relay");
    handle.shutdown();
    Ok(())
}

//! Relay server: TCP listener, access gate, and connection dispatch.
//!
//! The server binds according to the access policy (all interfaces with an
//! access list, loopback without one), accepts TCP connections, and spawns
//! one task per connection:
//!
//! accept -> [`AccessGate`] -> read request head -> [`ProxyEngine`]

use crate::classifier::DestinationClassifier;
use crate::config::ProxyConfig;
use crate::engine::ProxyEngine;
use crate::error::{ProxyError, Result};
use crate::gate::AccessGate;
use crate::http::{self, ReadHead};
use crate::tunnel::UpstreamTunnel;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Handle returned when the relay starts.
///
/// Call [`ProxyHandle::shutdown`] to stop accepting connections. Tunnels
/// already in flight run to completion.
pub struct ProxyHandle {
    /// The address the relay is listening on
    pub addr: SocketAddr,
    /// Send `true` to trigger graceful shutdown
    shutdown_tx: watch::Sender<bool>,
}

impl ProxyHandle {
    /// The actual port the relay is listening on.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Signal the relay to shut down gracefully.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Shared state for the relay.
struct ProxyState {
    gate: AccessGate,
    engine: ProxyEngine<DestinationClassifier, UpstreamTunnel>,
    /// Active connection count, for logging.
    active_connections: AtomicUsize,
}

/// Start the relay.
///
/// Binds to [`ProxyConfig::listen_addr`] and begins accepting connections
/// on the current tokio runtime. Returns once the listener is bound.
pub async fn start(config: ProxyConfig) -> Result<ProxyHandle> {
    let bind_addr = config.listen_addr();
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| ProxyError::Bind {
            addr: bind_addr.to_string(),
            source: e,
        })?;

    let local_addr = listener.local_addr().map_err(|e| ProxyError::Bind {
        addr: bind_addr.to_string(),
        source: e,
    })?;

    match config.access_list.as_deref() {
        Some(acl) => info!("Relay listening on {} (allowing {})", local_addr, acl),
        None => info!("Relay listening on {} (no access list, loopback only)", local_addr),
    }
    info!("Upstream proxy: {}", config.upstream.address());

    let classifier =
        DestinationClassifier::new(Arc::clone(&config.upstream), config.resolve_timeout);
    let tunnel = UpstreamTunnel::new(Arc::clone(&config.upstream), config.connect_timeout);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let state = Arc::new(ProxyState {
        gate: AccessGate::new(config.access_list.clone()),
        engine: ProxyEngine::new(classifier, tunnel, config.connect_timeout),
        active_connections: AtomicUsize::new(0),
    });

    // The caller MUST keep this runtime driven for the relay to make progress.
    tokio::spawn(accept_loop(listener, state, shutdown_rx));

    Ok(ProxyHandle {
        addr: local_addr,
        shutdown_tx,
    })
}

/// Accept loop: listen for connections until shutdown.
async fn accept_loop(
    listener: TcpListener,
    state: Arc<ProxyState>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        let active = state.active_connections.fetch_add(1, Ordering::Relaxed);
                        debug!("Accepted connection from {} ({} active)", peer, active + 1);
                        let state = Arc::clone(&state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, peer, &state).await {
                                debug!("Connection handler error for {}: {}", peer, e);
                            }
                            state.active_connections.fetch_sub(1, Ordering::Relaxed);
                        });
                    }
                    Err(e) => {
                        warn!("Accept error: {}", e);
                    }
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("Relay shutting down");
                    return;
                }
            }
        }
    }
}

/// Handle a single client connection.
async fn handle_connection(mut stream: TcpStream, peer: SocketAddr, state: &ProxyState) -> Result<()> {
    if !state.gate.admits(&peer) {
        return state.gate.reject(&mut stream, &peer).await;
    }

    let head = match http::read_request_head(&mut stream).await {
        Ok(ReadHead::Request(head)) => head,
        Ok(ReadHead::Closed) => return Ok(()), // Client disconnected
        Ok(ReadHead::TooLarge) => {
            http::send_status(&mut stream, 431, "Request Header Fields Too Large").await?;
            return Ok(());
        }
        Err(e) => {
            http::send_status(&mut stream, 400, "Bad Request").await?;
            return Err(e);
        }
    };

    state.engine.serve(stream, head).await
}

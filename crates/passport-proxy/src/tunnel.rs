//! Upstream tunnel establisher for CONNECT requests.
//!
//! Every CONNECT is chained through the upstream proxy, regardless of where
//! the target lives:
//!
//! 1. Dial the upstream proxy
//! 2. Send `CONNECT target` with `Proxy-Authorization: Basic ...`
//! 3. Read the status line and headers
//! 4. On 200, hand the raw stream back for byte relay
//! 5. Otherwise read the response body as the failure detail and close
//!
//! The handshake runs on the raw TCP stream before any TLS starts. The TLS
//! client does not speak until the tunnel is up, so bytes buffered past the
//! response header block can only be stray upstream output and are dropped.

use crate::engine::ConnectDialer;
use crate::error::{ProxyError, Result};
use crate::timeout;
use passport::UpstreamConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Largest rejection body kept as failure detail (64 KiB).
const MAX_REJECTION_BODY: u64 = 64 * 1024;

/// Maximum size of the upstream response header block (64 KiB).
const MAX_RESPONSE_HEADER: usize = 64 * 1024;

/// Dials the upstream proxy and performs an authenticated CONNECT.
#[derive(Debug, Clone)]
pub struct UpstreamTunnel {
    upstream: Arc<UpstreamConfig>,
    handshake_timeout: Option<Duration>,
}

impl UpstreamTunnel {
    #[must_use]
    pub fn new(upstream: Arc<UpstreamConfig>, handshake_timeout: Option<Duration>) -> Self {
        Self {
            upstream,
            handshake_timeout,
        }
    }

    /// Open a tunnel to `target` (`host:port`) through the upstream proxy.
    ///
    /// Dropping the returned future at any point closes the partially opened
    /// upstream connection.
    pub async fn establish(&self, target: &str) -> Result<TcpStream> {
        let operation = format!("CONNECT {} via {}", target, self.upstream.address());
        timeout::within(self.handshake_timeout, &operation, self.handshake(target)).await
    }

    async fn handshake(&self, target: &str) -> Result<TcpStream> {
        let address = self.upstream.address();
        let mut stream = TcpStream::connect(address).await.map_err(|e| {
            warn!("Failed to dial upstream proxy {}: {}", address, e);
            ProxyError::UpstreamConnect {
                host: address.to_string(),
                reason: e.to_string(),
            }
        })?;

        let request = build_connect_request(target, &self.upstream.basic_authorization());
        stream
            .write_all(request.as_bytes())
            .await
            .map_err(|e| handshake_error(target, "failed to send CONNECT", &e))?;
        drop(request);

        let mut reader = BufReader::new(stream);
        let head = read_response_head(&mut reader)
            .await
            .map_err(|e| handshake_error(target, "failed to read proxy response", &e))?;

        if head.status != 200 {
            // An unreadable body drops `reader`, closing the upstream connection.
            let body = read_rejection_body(&mut reader, &head).await.map_err(|e| {
                let what = format!("failed to read {} rejection body", head.status);
                handshake_error(target, &what, &e)
            })?;
            // Close before reporting so the upstream sees EOF promptly.
            let mut stream = reader.into_inner();
            let _ = stream.shutdown().await;
            drop(stream);

            let detail = String::from_utf8_lossy(&body).trim().to_string();
            let err = ProxyError::TunnelRejected {
                target: target.to_string(),
                status: head.status,
                detail,
            };
            warn!("{}", err);
            return Err(err);
        }

        if !reader.buffer().is_empty() {
            debug!(
                "Discarding {} bytes buffered after CONNECT response for {}",
                reader.buffer().len(),
                target
            );
        }
        debug!("Upstream tunnel established for {}", target);
        Ok(reader.into_inner())
    }
}

impl ConnectDialer for UpstreamTunnel {
    async fn dial(&self, target: &str) -> Result<TcpStream> {
        self.establish(target).await
    }
}

fn handshake_error(target: &str, what: &str, err: &std::io::Error) -> ProxyError {
    warn!("{} for {}: {}", what, target, err);
    ProxyError::TunnelHandshake {
        target: target.to_string(),
        reason: format!("{}: {}", what, err),
    }
}

/// Render the CONNECT request. Held in a zeroizing buffer since it carries
/// the credential.
fn build_connect_request(target: &str, authorization: &str) -> Zeroizing<String> {
    Zeroizing::new(format!(
        "CONNECT {target} HTTP/1.1\r\nHost: {target}\r\nProxy-Authorization: {authorization}\r\n\r\n"
    ))
}

/// Parsed upstream response status line and the framing headers we need.
#[derive(Debug, Default, PartialEq, Eq)]
struct ResponseHead {
    status: u16,
    content_length: Option<u64>,
    chunked: bool,
}

async fn read_response_head<R>(reader: &mut BufReader<R>) -> std::io::Result<ResponseHead>
where
    R: AsyncRead + Unpin,
{
    let mut status_line = String::new();
    if reader.read_line(&mut status_line).await? == 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "upstream closed before responding",
        ));
    }
    let status = parse_status_code(&status_line)?;
    let mut head = ResponseHead {
        status,
        ..ResponseHead::default()
    };

    let mut total = status_line.len();
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 || line.trim().is_empty() {
            break;
        }
        total = total.saturating_add(n);
        if total > MAX_RESPONSE_HEADER {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "upstream response headers too large",
            ));
        }
        if let Some((name, value)) = line.split_once(':') {
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                head.content_length = value.parse().ok();
            } else if name.eq_ignore_ascii_case("transfer-encoding") {
                head.chunked = value.to_ascii_lowercase().contains("chunked");
            }
        }
    }
    Ok(head)
}

/// Parse the status code from `HTTP/1.1 407 Proxy Authentication Required`.
fn parse_status_code(line: &str) -> std::io::Result<u16> {
    let invalid = || {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("malformed HTTP response: {}", line.trim_end()),
        )
    };
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some(version) if version.starts_with("HTTP/") => {}
        _ => return Err(invalid()),
    }
    parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(invalid)
}

/// Read a rejection body according to its framing, capped at
/// [`MAX_REJECTION_BODY`].
async fn read_rejection_body<R>(
    reader: &mut BufReader<R>,
    head: &ResponseHead,
) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut body = Vec::new();
    if head.chunked {
        read_chunked(reader, &mut body).await?;
    } else if let Some(len) = head.content_length {
        reader
            .take(len.min(MAX_REJECTION_BODY))
            .read_to_end(&mut body)
            .await?;
    } else {
        reader.take(MAX_REJECTION_BODY).read_to_end(&mut body).await?;
    }
    Ok(body)
}

async fn read_chunked<R>(reader: &mut BufReader<R>, body: &mut Vec<u8>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    loop {
        let mut size_line = String::new();
        if reader.read_line(&mut size_line).await? == 0 {
            return Ok(());
        }
        let size_str = size_line.trim().split(';').next().unwrap_or("");
        let size = u64::from_str_radix(size_str, 16).map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid chunk size: {}", size_str),
            )
        })?;
        if size == 0 {
            return Ok(());
        }

        // Read straight into `body`; bytes past the cap are left unread.
        let room = MAX_REJECTION_BODY.saturating_sub(body.len() as u64);
        (&mut *reader).take(size.min(room)).read_to_end(body).await?;
        if body.len() as u64 >= MAX_REJECTION_BODY {
            return Ok(());
        }

        let mut crlf = String::new();
        reader.read_line(&mut crlf).await?;
    }
}

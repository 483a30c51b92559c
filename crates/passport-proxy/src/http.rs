//! Minimal HTTP/1.x request-head handling for the relay.
//!
//! Only what the engine needs: read the request line and header block,
//! split out the method and target, and write short status responses.
//! Bodies are never parsed; they are relayed as raw bytes.

use crate::error::{ProxyError, Result};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};

/// Maximum total size of the request head, request line included (64 KiB).
/// Prevents OOM from clients sending unbounded header data.
pub const MAX_HEADER_SIZE: usize = 64 * 1024;

/// How much of an offending request line is echoed into error messages.
const ERROR_EXCERPT_LEN: usize = 128;

/// Default port for CONNECT targets given without one.
const DEFAULT_CONNECT_PORT: u16 = 443;

/// Headers that describe the client-to-relay hop and are not forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authorization",
];

/// A request head read off the client connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    pub target: String,
    pub version: String,
    /// Header lines without their CRLF terminators
    pub headers: Vec<String>,
    /// Bytes read past the header block (start of body or tunnel payload)
    pub buffered: Vec<u8>,
}

/// Outcome of reading a request head.
#[derive(Debug)]
pub enum ReadHead {
    Request(RequestHead),
    /// Client closed before sending a request line
    Closed,
    /// Header block exceeded [`MAX_HEADER_SIZE`]
    TooLarge,
}

/// Read the request line and headers from `stream`.
///
/// At most [`MAX_HEADER_SIZE`] bytes are consumed for the whole head; a line
/// that would cross the budget yields [`ReadHead::TooLarge`] without being
/// buffered further.
pub async fn read_request_head<S>(stream: &mut S) -> Result<ReadHead>
where
    S: AsyncRead + Unpin,
{
    // Keep the BufReader alive until the whole head is consumed; it may read
    // ahead into the body, and those bytes are handed back in `buffered`.
    let mut buf_reader = BufReader::new(stream);
    let mut budget = MAX_HEADER_SIZE;

    let first_line = match read_line_within(&mut buf_reader, &mut budget).await? {
        Line::Complete(line) => line,
        Line::Eof => return Ok(ReadHead::Closed),
        Line::Overflow => return Ok(ReadHead::TooLarge),
    };
    if first_line.trim().is_empty() {
        return Ok(ReadHead::Closed);
    }

    let mut headers = Vec::new();
    loop {
        match read_line_within(&mut buf_reader, &mut budget).await? {
            Line::Complete(line) if !line.trim().is_empty() => {
                headers.push(line.trim_end_matches(['\r', '\n']).to_string());
            }
            Line::Complete(_) | Line::Eof => break,
            Line::Overflow => return Ok(ReadHead::TooLarge),
        }
    }

    let buffered = buf_reader.buffer().to_vec();
    let (method, target, version) = parse_request_line(first_line.trim_end())?;

    Ok(ReadHead::Request(RequestHead {
        method,
        target,
        version,
        headers,
        buffered,
    }))
}

/// One line of a request head read under a byte budget.
enum Line {
    Complete(String),
    /// Stream ended before any byte of the line
    Eof,
    /// Budget spent before a newline arrived
    Overflow,
}

async fn read_line_within<R>(reader: &mut R, budget: &mut usize) -> std::io::Result<Line>
where
    R: AsyncBufRead + Unpin,
{
    if *budget == 0 {
        return Ok(Line::Overflow);
    }
    let limit = u64::try_from(*budget).unwrap_or(u64::MAX);
    let mut raw = Vec::new();
    let mut limited = (&mut *reader).take(limit);
    let n = limited.read_until(b'\n', &mut raw).await?;
    if n == 0 {
        return Ok(Line::Eof);
    }
    *budget = budget.saturating_sub(n);
    if !raw.ends_with(b"\n") && *budget == 0 {
        return Ok(Line::Overflow);
    }
    String::from_utf8(raw).map(Line::Complete).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "request head is not valid UTF-8",
        )
    })
}

/// Split `METHOD target HTTP/x.y`.
pub fn parse_request_line(line: &str) -> Result<(String, String, String)> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() != 3 || !parts[2].starts_with("HTTP/") {
        let excerpt: String = line.chars().take(ERROR_EXCERPT_LEN).collect();
        return Err(ProxyError::HttpParse(format!(
            "malformed request line: {}",
            excerpt
        )));
    }
    Ok((
        parts[0].to_string(),
        parts[1].to_string(),
        parts[2].to_string(),
    ))
}

/// Normalize a CONNECT authority to `host:port`, defaulting the port to 443.
pub fn parse_connect_target(authority: &str) -> Result<(String, u16)> {
    if authority.is_empty() {
        return Err(ProxyError::HttpParse("empty CONNECT target".to_string()));
    }

    // Bracketed IPv6: [::1]:443 or [::1]
    if let Some(rest) = authority.strip_prefix('[') {
        let (host, after) = rest.split_once(']').ok_or_else(|| {
            ProxyError::HttpParse(format!("invalid CONNECT target: {}", authority))
        })?;
        let port = match after.strip_prefix(':') {
            Some(port_str) => parse_port(port_str, authority)?,
            None if after.is_empty() => DEFAULT_CONNECT_PORT,
            None => {
                return Err(ProxyError::HttpParse(format!(
                    "invalid CONNECT target: {}",
                    authority
                )))
            }
        };
        return Ok((format!("[{}]", host), port));
    }

    match authority.rsplit_once(':') {
        Some((host, port_str)) => Ok((host.to_string(), parse_port(port_str, authority)?)),
        None => Ok((authority.to_string(), DEFAULT_CONNECT_PORT)),
    }
}

fn parse_port(port_str: &str, authority: &str) -> Result<u16> {
    port_str
        .parse::<u16>()
        .map_err(|_| ProxyError::HttpParse(format!("invalid port in CONNECT: {}", authority)))
}

/// Whether a header line names a hop-by-hop header.
#[must_use]
pub fn is_hop_by_hop(header_line: &str) -> bool {
    let name = header_line.split(':').next().unwrap_or("").trim();
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// Send a bare status line with no body.
pub async fn send_status<S>(stream: &mut S, status: u16, reason: &str) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let response = format!("HTTP/1.1 {} {}\r\n\r\n", status, reason);
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}

/// Send a complete plain-text response and mark the connection for close.
pub async fn send_text<S>(stream: &mut S, status: u16, reason: &str, body: &str) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}

//! Raw HTTP/1 upgrade handshake bytes.
//!
//! # Responsibilities
//! - Re-encode the client's upgrade request exactly: request line plus
//!   every header, in the order received, one line per value
//! - Read and parse the backend's response head off a raw socket
//!
//! # Design Decisions
//! - Pure encode/parse functions, testable without sockets
//! - Header names keep the form the server parsed them in (lowercase)
//! - Response parsing is strict; anything odd tears the connection down

use axum::http::header::{HeaderName, HeaderValue};
use axum::http::request::Parts;
use axum::http::{StatusCode, Version};
use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

const CRLF: &[u8] = b"\r\n";
const HEAD_END: &[u8] = b"\r\n\r\n";

/// Upper bound on the backend's response head.
pub const MAX_RESPONSE_HEAD_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("I/O error during handshake: {0}")]
    Io(#[from] std::io::Error),

    #[error("backend closed the connection before completing its response head")]
    ClosedEarly,

    #[error("backend response head exceeds {0} bytes")]
    HeadTooLarge(usize),

    #[error("malformed backend response: {0}")]
    Malformed(&'static str),
}

/// The parts of an upgrade request that are replayed to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRequestHead {
    pub method: String,
    /// Origin-form target, path plus query.
    pub target: String,
    pub version: Version,
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

impl UpgradeRequestHead {
    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            method: parts.method.as_str().to_string(),
            target: parts
                .uri
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| "/".to_string()),
            version: parts.version,
            headers: parts
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        }
    }

    /// `METHOD target HTTP/x.y\r\n` + `name: value\r\n`... + `\r\n`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256);
        out.extend_from_slice(self.method.as_bytes());
        out.push(b' ');
        out.extend_from_slice(self.target.as_bytes());
        out.push(b' ');
        out.extend_from_slice(version_str(self.version).as_bytes());
        out.extend_from_slice(CRLF);
        for (name, value) in &self.headers {
            out.extend_from_slice(name.as_str().as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(CRLF);
        }
        out.extend_from_slice(CRLF);
        out
    }
}

/// Upgrades only exist in HTTP/1.x; anything else is written as 1.1.
pub fn version_str(version: Version) -> &'static str {
    if version == Version::HTTP_10 {
        "HTTP/1.0"
    } else {
        "HTTP/1.1"
    }
}

/// Status line and headers of the backend's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

impl ResponseHead {
    /// First value of `name`, if present and valid ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.as_str().eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v.to_str().ok())
    }
}

/// Parse a response head from `buf`.
///
/// Returns `Ok(None)` while the terminating blank line has not arrived yet,
/// otherwise the head and the number of bytes it occupied.
pub fn parse_response_head(buf: &[u8]) -> Result<Option<(ResponseHead, usize)>, HandshakeError> {
    let Some(end) = find(buf, HEAD_END) else {
        return Ok(None);
    };
    let consumed = end + HEAD_END.len();
    let mut lines = buf[..end].split(|b| *b == b'\n').map(trim_cr);

    let status_line = lines.next().ok_or(HandshakeError::Malformed("empty head"))?;
    let status = parse_status_line(status_line)?;

    let mut headers = Vec::new();
    for line in lines {
        if line.first().is_some_and(|b| *b == b' ' || *b == b'\t') {
            return Err(HandshakeError::Malformed("folded header line"));
        }
        let colon = line
            .iter()
            .position(|b| *b == b':')
            .ok_or(HandshakeError::Malformed("header line without colon"))?;
        let name = HeaderName::from_bytes(&line[..colon])
            .map_err(|_| HandshakeError::Malformed("invalid header name"))?;
        let value = HeaderValue::from_bytes(trim_ows(&line[colon + 1..]))
            .map_err(|_| HandshakeError::Malformed("invalid header value"))?;
        headers.push((name, value));
    }

    Ok(Some((ResponseHead { status, headers }, consumed)))
}

/// Read from `stream` until a full response head is buffered. Bytes read
/// past the head are returned alongside it.
pub async fn read_response_head<S>(stream: &mut S, max: usize) -> Result<(ResponseHead, Bytes), HandshakeError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(4096);
    loop {
        if let Some((head, consumed)) = parse_response_head(&buf)? {
            let leftover = buf.split_off(consumed).freeze();
            return Ok((head, leftover));
        }
        if buf.len() >= max {
            return Err(HandshakeError::HeadTooLarge(max));
        }
        if stream.read_buf(&mut buf).await? == 0 {
            return Err(HandshakeError::ClosedEarly);
        }
    }
}

fn parse_status_line(line: &[u8]) -> Result<StatusCode, HandshakeError> {
    let mut parts = line.splitn(3, |b| *b == b' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with(b"HTTP/1.") {
        return Err(HandshakeError::Malformed("status line is not HTTP/1.x"));
    }
    let code = parts.next().ok_or(HandshakeError::Malformed("missing status code"))?;
    StatusCode::from_bytes(code).map_err(|_| HandshakeError::Malformed("invalid status code"))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn trim_ows(mut value: &[u8]) -> &[u8] {
    while let [b' ' | b'\t', rest @ ..] = value {
        value = rest;
    }
    while let [rest @ .., b' ' | b'\t'] = value {
        value = rest;
    }
    value
}

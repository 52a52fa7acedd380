//! WebSocket (and other HTTP/1 upgrade) proxying.
//!
//! # Responsibilities
//! - Detect upgrade requests
//! - Replay the client's handshake on a fresh TCP connection to the gateway
//! - Relay the gateway's answer, then splice both sockets byte-for-byte
//!
//! # Data Flow
//! ```text
//! client ── upgrade request ──→ proxy ── raw handshake bytes ──→ gateway
//! client ←── 101 + headers ──── proxy ←── 101 response head ──── gateway
//! client ←══════════ copy_bidirectional (no frame parsing) ══════════→ gateway
//! ```
//!
//! # Design Decisions
//! - Frames are never decoded; subprotocols and extensions pass untouched
//! - Bytes the gateway sent right after its 101 are delivered first
//! - A gateway that refuses the upgrade gets its answer relayed as a
//!   normal response

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::header::{self, HeaderMap};
use axum::http::{Request, Response, StatusCode};
use bytes::{Bytes, BytesMut};
use hyper::body::Incoming;
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::http::handshake::{
    read_response_head, HandshakeError, ResponseHead, UpgradeRequestHead, MAX_RESPONSE_HEAD_BYTES,
};
use crate::http::proxy::strip_hop_by_hop;
use crate::observability::metrics;

/// Cap on a refused upgrade's body relayed back to the client.
pub const MAX_REFUSAL_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum UpgradeError {
    #[error("failed to connect to gateway at {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("failed to send handshake to gateway: {0}")]
    Send(std::io::Error),

    #[error(transparent)]
    Handshake(#[from] HandshakeError),
}

/// `Connection` lists `upgrade` and an `Upgrade` header is present.
pub fn is_upgrade_request<B>(request: &Request<B>) -> bool {
    let headers = request.headers();
    headers.contains_key(header::UPGRADE)
        && headers
            .get_all(header::CONNECTION)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
}

/// Proxy an upgrade request to `backend`.
///
/// On success the returned response is what the client sees (the gateway's
/// 101 or its refusal). An error means the client connection should be
/// dropped without a response.
pub async fn proxy_upgrade(
    mut request: Request<Incoming>,
    backend: SocketAddr,
) -> Result<Response<Body>, UpgradeError> {
    let on_upgrade = hyper::upgrade::on(&mut request);
    let (parts, _body) = request.into_parts();
    let head = UpgradeRequestHead::from_parts(&parts);
    let path = log_path(&head.target);

    let mut upstream = TcpStream::connect(backend)
        .await
        .map_err(|source| UpgradeError::Connect {
            addr: backend,
            source,
        })?;
    upstream
        .write_all(&head.encode())
        .await
        .map_err(UpgradeError::Send)?;

    let (response_head, leftover) = read_response_head(&mut upstream, MAX_RESPONSE_HEAD_BYTES).await?;

    if response_head.status != StatusCode::SWITCHING_PROTOCOLS {
        tracing::debug!(
            %path,
            status = response_head.status.as_u16(),
            "Gateway refused upgrade"
        );
        metrics::record_upgrade("refused");
        let body = read_refusal_body(&response_head, leftover, &mut upstream).await;
        return Ok(refusal_response(response_head, body));
    }

    tracing::debug!(%path, "Upgrade accepted, splicing");
    metrics::record_upgrade("spliced");
    tokio::spawn(splice(on_upgrade, upstream, leftover));
    Ok(switching_protocols(response_head))
}

/// Request target without its query, which may carry credentials.
fn log_path(target: &str) -> &str {
    target.split_once('?').map_or(target, |(path, _)| path)
}

/// Relay the gateway's 101 with every header in order.
fn switching_protocols(head: ResponseHead) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
    let headers = response.headers_mut();
    for (name, value) in head.headers {
        headers.append(name, value);
    }
    response
}

fn refusal_response(head: ResponseHead, body: Bytes) -> Response<Body> {
    let mut headers = HeaderMap::new();
    for (name, value) in head.headers {
        headers.append(name, value);
    }
    strip_hop_by_hop(&mut headers);
    headers.remove(header::CONTENT_LENGTH);

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = head.status;
    *response.headers_mut() = headers;
    response
}

/// Read what the gateway sent with its refusal, bounded by `Content-Length`
/// when given, else until close, and never past `MAX_REFUSAL_BODY_BYTES`.
async fn read_refusal_body(head: &ResponseHead, leftover: Bytes, upstream: &mut TcpStream) -> Bytes {
    let limit = head
        .header("content-length")
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(MAX_REFUSAL_BODY_BYTES)
        .min(MAX_REFUSAL_BODY_BYTES);
    if head.header("transfer-encoding").is_some() {
        // Chunked refusals are not decoded; the status alone is relayed.
        return Bytes::new();
    }

    let mut body = BytesMut::from(&leftover[..leftover.len().min(limit)]);
    while body.len() < limit {
        match upstream.read_buf(&mut body).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, "Error reading refused upgrade body");
                break;
            }
        }
    }
    body.truncate(limit);
    body.freeze()
}

/// Wait for hyper to hand over the client socket, then pump bytes both ways
/// until either side closes.
async fn splice(on_upgrade: OnUpgrade, mut upstream: TcpStream, leftover: Bytes) {
    let upgraded = match on_upgrade.await {
        Ok(upgraded) => upgraded,
        Err(e) => {
            tracing::debug!(error = %e, "Client upgrade failed");
            return;
        }
    };
    let mut client = TokioIo::new(upgraded);

    if !leftover.is_empty() {
        if let Err(e) = client.write_all(&leftover).await {
            tracing::debug!(error = %e, "Failed to deliver early gateway bytes");
            return;
        }
    }

    match tokio::io::copy_bidirectional(&mut client, &mut upstream).await {
        Ok((to_gateway, to_client)) => {
            tracing::debug!(to_gateway, to_client, "Upgraded connection closed");
        }
        Err(e) => {
            tracing::debug!(error = %e, "Upgraded connection ended with error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue};

    #[test]
    fn test_log_path_drops_query() {
        assert_eq!(log_path("/ws?token=secret&room=1"), "/ws");
        assert_eq!(log_path("/ws"), "/ws");
        assert_eq!(log_path("/?"), "/");
    }

    #[test]
    fn test_is_upgrade_request() {
        let request = Request::builder()
            .header("Connection", "keep-alive, Upgrade")
            .header("Upgrade", "websocket")
            .body(())
            .unwrap();
        assert!(is_upgrade_request(&request));

        let request = Request::builder()
            .header("Upgrade", "websocket")
            .body(())
            .unwrap();
        assert!(!is_upgrade_request(&request));

        let request = Request::builder()
            .header("Connection", "upgrade")
            .body(())
            .unwrap();
        assert!(!is_upgrade_request(&request));
    }

    #[test]
    fn test_switching_protocols_keeps_header_order() {
        let head = ResponseHead {
            status: StatusCode::SWITCHING_PROTOCOLS,
            headers: vec![
                (header::UPGRADE, HeaderValue::from_static("websocket")),
                (header::CONNECTION, HeaderValue::from_static("Upgrade")),
                (
                    HeaderName::from_static("sec-websocket-accept"),
                    HeaderValue::from_static("abc="),
                ),
            ],
        };
        let response = switching_protocols(head);
        assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);
        let names: Vec<&str> = response.headers().keys().map(|k| k.as_str()).collect();
        assert_eq!(names, ["upgrade", "connection", "sec-websocket-accept"]);
    }

    #[tokio::test]
    async fn test_refusal_body_is_bounded_by_content_length() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"lo world and more").await.unwrap();
        });
        let mut upstream = TcpStream::connect(addr).await.unwrap();

        let head = ResponseHead {
            status: StatusCode::FORBIDDEN,
            headers: vec![(header::CONTENT_LENGTH, HeaderValue::from_static("11"))],
        };
        let body = read_refusal_body(&head, Bytes::from_static(b"hel"), &mut upstream).await;
        assert_eq!(&body[..], b"hello world");

        let response = refusal_response(head, body);
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::CONTENT_LENGTH).is_none());
    }
}

//! Plain HTTP forwarding to the gateway.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the backend address and `Host` onto the
//!   configured gateway authority
//! - Stream request and response bodies without buffering
//! - Answer 502 with a fixed plain-text message when the backend is down
//!
//! # Design Decisions
//! - One pooled hyper client shared by every connection
//! - Hop-by-hop headers are dropped in both directions; everything else,
//!   including `x-request-id`, passes through untouched
//! - No retries: a failed forward is reported, not replayed

use std::net::SocketAddr;
use std::str::FromStr;

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::uri::{Authority, Scheme};
use axum::http::{Request, Response, StatusCode, Uri, Version};
use hyper::body::Incoming;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;

use crate::config::GatewayConfig;
use crate::http::response::{text_response, TEXT_CONTENT_TYPE};

pub const BAD_GATEWAY_MESSAGE: &str =
    "Gateway is not reachable yet. Please wait a few minutes and try again.\n";

/// Headers that describe a single connection and never cross the proxy.
const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

pub type HttpClient = Client<HttpConnector, Body>;

pub fn build_client() -> HttpClient {
    Client::builder(TokioExecutor::new()).build(HttpConnector::new())
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid backend authority {0:?}")]
    Authority(String),

    #[error("invalid Host header value {0:?}")]
    HostHeader(String),
}

/// Where proxied traffic goes.
#[derive(Debug, Clone)]
pub struct Upstream {
    addr: SocketAddr,
    authority: Authority,
    host_header: HeaderValue,
}

impl Upstream {
    /// `addr` is the resolved backend; `gateway` supplies the Host header.
    pub fn new(addr: SocketAddr, gateway: &GatewayConfig) -> Result<Self, UpstreamError> {
        let authority = Authority::from_str(&addr.to_string())
            .map_err(|_| UpstreamError::Authority(addr.to_string()))?;
        let host = gateway.authority();
        let host_header =
            HeaderValue::from_str(&host).map_err(|_| UpstreamError::HostHeader(host.clone()))?;
        Ok(Self {
            addr,
            authority,
            host_header,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn uri_for(&self, original: &Uri) -> Result<Uri, axum::http::Error> {
        let path_and_query = original
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
    }
}

/// Forward `request` to the gateway and stream the answer back.
pub async fn forward(client: &HttpClient, upstream: &Upstream, request: Request<Incoming>) -> Response<Body> {
    let (mut parts, body) = request.into_parts();
    let method = parts.method.clone();

    parts.uri = match upstream.uri_for(&parts.uri) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(error = %e, "Could not build backend URI");
            return bad_gateway();
        }
    };
    parts.version = Version::HTTP_11;
    strip_hop_by_hop(&mut parts.headers);
    parts.headers.insert(header::HOST, upstream.host_header.clone());

    let path = parts.uri.path().to_string();
    let outbound = Request::from_parts(parts, Body::new(body));

    match client.request(outbound).await {
        Ok(response) => {
            let (mut parts, body) = response.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            tracing::debug!(%method, %path, status = parts.status.as_u16(), "Proxied request");
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::warn!(%method, %path, backend = %upstream.addr, error = %e, "Gateway unreachable");
            bad_gateway()
        }
    }
}

pub fn bad_gateway() -> Response<Body> {
    text_response(StatusCode::BAD_GATEWAY, BAD_GATEWAY_MESSAGE, TEXT_CONTENT_TYPE)
}

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|token| HeaderName::from_str(token.trim()).ok())
        .collect();
    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway(host: &str, port: u16) -> GatewayConfig {
        GatewayConfig {
            host: host.to_string(),
            port,
            ..GatewayConfig::default()
        }
    }

    #[test]
    fn test_uri_rewrite_keeps_path_and_query() {
        let upstream = Upstream::new("127.0.0.1:18789".parse().unwrap(), &gateway("127.0.0.1", 18789)).unwrap();
        let uri = upstream.uri_for(&"/chat?x=1&y=2".parse().unwrap()).unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:18789/chat?x=1&y=2");
    }

    #[test]
    fn test_host_header_uses_configured_name() {
        let upstream = Upstream::new("[::1]:18789".parse().unwrap(), &gateway("localhost", 18789)).unwrap();
        assert_eq!(upstream.host_header, "localhost:18789");
        assert_eq!(upstream.authority.as_str(), "[::1]:18789");
    }

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-secret-hop"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-secret-hop", HeaderValue::from_static("1"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        headers.insert("x-request-id", HeaderValue::from_static("abc"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 2);
        assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
        assert_eq!(headers["x-request-id"], "abc");
    }

    #[tokio::test]
    async fn test_bad_gateway_body() {
        let response = bad_gateway();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], BAD_GATEWAY_MESSAGE.as_bytes());
    }
}

//! HTTP server and per-request dispatch.
//!
//! # Responsibilities
//! - Accept connections and serve HTTP/1.1 on each with upgrades enabled
//! - Send every request through the mode selector:
//!   setup router, 302 to `/__setup/`, or the gateway proxy
//! - Send upgrade requests to the WebSocket proxy, or drop them in the
//!   setup namespace
//! - Drain in-flight connections on shutdown
//!
//! # Design Decisions
//! - Hand-rolled hyper accept loop rather than `axum::serve`: dispatch
//!   needs to hand raw upgrades to the gateway and to close connections
//!   without answering
//! - Returning `Err` from the service makes hyper drop the connection

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderValue, Request, Response, Uri};
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch};
use tower::ServiceExt;

use crate::config::ProxyConfig;
use crate::http::proxy::{self, HttpClient, Upstream, UpstreamError};
use crate::http::response::redirect;
use crate::http::websocket::{self, UpgradeError};
use crate::net::{ConnectionGuard, ConnectionPermit, ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics;
use crate::routing::{Decision, ModeSelector, UpgradeDecision};
use crate::setup::{self, SetupState};

/// How long shutdown waits for open connections.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

const SETUP_ROOT: &str = "/__setup/";

/// Reasons a connection is closed without a response.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("upgrade request for {path} rejected in setup namespace")]
    UpgradeRejected { path: String },

    #[error("upgrade proxy failed: {0}")]
    Upgrade(#[from] UpgradeError),
}

/// Everything a request needs, cloned per connection.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub selector: Arc<ModeSelector>,
    pub upstream: Arc<Upstream>,
    pub client: HttpClient,
    pub setup: Router,
}

impl AppState {
    pub fn new(config: Arc<ProxyConfig>, backend: SocketAddr) -> Result<Self, UpstreamError> {
        let upstream = Upstream::new(backend, &config.gateway)?;
        let selector = ModeSelector::from_config(&config.setup);
        let setup = setup::router(SetupState::new(Arc::clone(&config)));
        Ok(Self {
            config,
            selector: Arc::new(selector),
            upstream: Arc::new(upstream),
            client: proxy::build_client(),
            setup,
        })
    }
}

pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    /// `backend` is the resolved gateway address.
    pub fn new(config: ProxyConfig, backend: SocketAddr) -> Result<Self, UpstreamError> {
        Ok(Self {
            state: AppState::new(Arc::new(config), backend)?,
        })
    }

    /// Serve until `shutdown` fires, then drain for up to `DRAIN_TIMEOUT`.
    pub async fn run(self, listener: Listener, mut shutdown: broadcast::Receiver<()>) -> Result<(), ListenerError> {
        let local = listener.local_addr().map_err(ListenerError::Accept)?;
        tracing::info!(address = %local, max_connections = listener.max_connections(), "HTTP server accepting connections");

        let tracker = ConnectionTracker::new();
        let (drain_tx, drain_rx) = watch::channel(());
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let guard = tracker.track();
                        let state = self.state.clone();
                        let draining = drain_rx.clone();
                        tokio::spawn(serve_connection(stream, peer, state, guard, permit, draining));
                    }
                    Err(ListenerError::Closed) => break,
                    Err(e) => {
                        // Usually fd exhaustion; back off instead of spinning.
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown requested, no longer accepting connections");
                    break;
                }
            }
        }

        drop(listener);
        let _ = drain_tx.send(());
        let remaining = tracker.drain(DRAIN_TIMEOUT).await;
        if remaining > 0 {
            tracing::warn!(remaining, "Drain deadline passed with connections still open");
        }
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    state: AppState,
    guard: ConnectionGuard,
    _permit: ConnectionPermit,
    mut draining: watch::Receiver<()>,
) {
    let connection_id = guard.id();
    let service = service_fn(move |request| dispatch(state.clone(), request));
    let connection = http1::Builder::new()
        .serve_connection(TokioIo::new(stream), service)
        .with_upgrades();
    let mut connection = std::pin::pin!(connection);

    // Idle keep-alive connections close at once; busy ones finish their
    // in-flight request first.
    let mut shutting_down = false;
    loop {
        tokio::select! {
            result = connection.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(%connection_id, %peer, error = %e, "Connection closed with error");
                }
                break;
            }
            _ = draining.changed(), if !shutting_down => {
                shutting_down = true;
                connection.as_mut().graceful_shutdown();
            }
        }
    }
}

/// Route one request.
pub async fn dispatch(state: AppState, request: Request<Incoming>) -> Result<Response<Body>, ProxyError> {
    let path = request.uri().path().to_string();

    if websocket::is_upgrade_request(&request) {
        return match state.selector.decide_upgrade(&path) {
            UpgradeDecision::Reject => {
                metrics::record_upgrade("rejected");
                tracing::debug!(%path, "Dropping upgrade request in setup namespace");
                Err(ProxyError::UpgradeRejected { path })
            }
            UpgradeDecision::Proxy => websocket::proxy_upgrade(request, state.upstream.addr())
                .await
                .map_err(|e| {
                    metrics::record_upgrade("upstream_error");
                    tracing::warn!(%path, error = %e, "Upgrade proxy failed");
                    ProxyError::from(e)
                }),
        };
    }

    let response = match state.selector.decide(&path) {
        Decision::RedirectToSetupRoot => {
            let response = redirect(setup_root_location(request.uri()));
            metrics::record_request("setup", response.status().as_u16());
            response
        }
        Decision::Setup => {
            let response = state
                .setup
                .oneshot(request.map(Body::new))
                .await
                .unwrap_or_else(|never| match never {});
            metrics::record_request("setup", response.status().as_u16());
            response
        }
        Decision::Proxy => {
            let response = proxy::forward(&state.client, &state.upstream, request).await;
            metrics::record_request("proxy", response.status().as_u16());
            response
        }
    };
    Ok(response)
}

/// `/__setup/`, carrying over the query of the original request.
fn setup_root_location(uri: &Uri) -> HeaderValue {
    uri.query()
        .and_then(|query| HeaderValue::from_str(&format!("{SETUP_ROOT}?{query}")).ok())
        .unwrap_or(HeaderValue::from_static(SETUP_ROOT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_root_location_keeps_query() {
        let uri: Uri = "/__setup".parse().unwrap();
        assert_eq!(setup_root_location(&uri), "/__setup/");

        let uri: Uri = "/__setup?lang=de&step=2".parse().unwrap();
        assert_eq!(setup_root_location(&uri), "/__setup/?lang=de&step=2");
    }
}

//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;

use setup_proxy::config::ProxyConfig;
use setup_proxy::http::HttpServer;
use setup_proxy::lifecycle::Shutdown;
use setup_proxy::net::{Listener, ListenerError};

/// A running proxy on an ephemeral port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), ListenerError>>,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }
}

pub async fn spawn_proxy(config: ProxyConfig, backend: SocketAddr) -> TestProxy {
    let listener = Listener::bind("127.0.0.1:0".parse().unwrap(), config.listener.max_connections)
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config, backend).unwrap();
    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    let handle = tokio::spawn(server.run(listener, receiver));
    TestProxy {
        addr,
        shutdown,
        handle,
    }
}

/// Client that never follows redirects, so 302s can be asserted.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// Config rooted in `root`: state dir and config file under `root/state`,
/// CLI calls run `sh clawdbot ...` from `root`.
pub fn config_in(root: &Path, setup_enabled: bool) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.setup.enabled = setup_enabled;
    config.setup.active_dir = root.to_path_buf();
    config.setup.state_dir = root.join("state");
    config.setup.config_path = root.join("state").join("clawdbot.json");
    config.gateway.cli_program = "sh".to_string();
    config.gateway.call_timeout_secs = 5;
    config
}

pub fn config_file(config: &ProxyConfig) -> PathBuf {
    config.setup.config_path.clone()
}

/// Write the gateway config file, switching setup mode off for `/`.
pub fn create_gateway_config(config: &ProxyConfig) {
    let path = config_file(config);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, "{}").unwrap();
}

/// Install a fake `clawdbot` CLI script in the active dir.
pub fn install_fake_cli(config: &ProxyConfig, script: &str) {
    fs::write(config.setup.active_dir.join("clawdbot"), script).unwrap();
}

/// An address nothing listens on.
pub async fn dead_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// HTTP backend that answers every request with a JSON description of it.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(echo_connection(socket));
        }
    });
    addr
}

async fn echo_connection(mut socket: TcpStream) {
    let mut buf = Vec::new();
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let mut chunk = [0u8; 4096];
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split(' ');
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }
    let header = |name: &str| {
        headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    };
    let content_length: usize = header("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < content_length {
        let mut chunk = [0u8; 4096];
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => body.extend_from_slice(&chunk[..n]),
        }
    }

    let description = json!({
        "method": method,
        "target": target,
        "host": header("host"),
        "requestId": header("x-request-id"),
        "body": String::from_utf8_lossy(&body),
    })
    .to_string();
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nX-Backend: echo\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        description.len(),
        description
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// WebSocket backend that echoes text and binary messages and reports the
/// request path and first offered subprotocol in response headers.
pub async fn start_ws_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let callback = |request: &Request, mut response: Response| {
                    let target = request
                        .uri()
                        .path_and_query()
                        .map(|pq| pq.as_str().to_string())
                        .unwrap_or_default();
                    response
                        .headers_mut()
                        .insert("x-backend-target", HeaderValue::from_str(&target).unwrap());
                    if let Some(protocol) = request.headers().get("sec-websocket-protocol") {
                        let first = protocol.to_str().unwrap().split(',').next().unwrap().trim();
                        response
                            .headers_mut()
                            .insert("sec-websocket-protocol", HeaderValue::from_str(first).unwrap());
                    }
                    Ok::<_, ErrorResponse>(response)
                };
                let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(socket, callback).await else {
                    return;
                };
                while let Some(Ok(message)) = ws.next().await {
                    if message.is_text() || message.is_binary() {
                        if ws.send(message).await.is_err() {
                            break;
                        }
                    } else if message.is_close() {
                        break;
                    }
                }
            });
        }
    });
    addr
}

/// Backend that answers every request with a fixed raw response.
pub async fn start_raw_backend(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

pub async fn json_body(response: reqwest::Response) -> Value {
    response.json().await.unwrap()
}

//! Setup proxy entry point.
//!
//! A reverse proxy in front of the gateway. While setup mode is on and the
//! gateway has no config file yet, it serves a setup UI and API locally;
//! everything else, WebSocket upgrades included, goes to the gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     client ──▶ net::listener ──▶ http::server ──▶ routing::mode
//!                                                      │
//!                        ┌─────────────────────────────┼────────────────────┐
//!                        ▼                             ▼                    ▼
//!                  setup router                 http::proxy         http::websocket
//!                  (UI + JSON API)              (HTTP → gateway)    (upgrade splice)
//!                     │        │
//!                     ▼        ▼
//!              gateway::client  store::env_file
//!              (CLI subprocess) (state-dir .env)
//! ```

use clap::Parser;

use setup_proxy::config::ProxyArgs;
use setup_proxy::lifecycle::startup;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    startup::run(ProxyArgs::parse()).await?;
    Ok(())
}

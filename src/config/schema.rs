//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! Types derive `Serialize` so the effective configuration can be logged
//! at startup. Nothing in it is secret.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// Path prefix reserved for the setup UI and API.
pub const SETUP_PREFIX: &str = "/__setup";

/// Root configuration for the setup proxy.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ProxyConfig {
    /// Listener configuration (bind host/port, connection limit).
    pub listener: ListenerConfig,

    /// Backend gateway the proxy forwards to.
    pub gateway: GatewayConfig,

    /// Setup mode settings.
    pub setup: SetupConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ProxyConfig {
    /// Path of the key-value state file, always `<state dir>/.env`.
    pub fn env_path(&self) -> PathBuf {
        self.setup.state_dir.join(".env")
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ListenerConfig {
    /// Bind host (e.g. "127.0.0.1").
    pub host: String,

    /// Bind port.
    pub port: u16,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl ListenerConfig {
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8099,
            max_connections: 1024,
        }
    }
}

/// Backend gateway configuration.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayConfig {
    /// Gateway host.
    pub host: String,

    /// Gateway port.
    pub port: u16,

    /// Program used to launch the gateway CLI (`<program> clawdbot ...`).
    pub cli_program: String,

    /// Hard timeout for a single downstream call, in seconds.
    pub call_timeout_secs: u64,
}

impl GatewayConfig {
    /// `host:port`, also used as the rewritten `Host` header.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// WebSocket URL handed to the gateway CLI.
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.authority())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 18789,
            cli_program: "pnpm".to_string(),
            call_timeout_secs: 60,
        }
    }
}

/// Setup mode configuration.
#[derive(Debug, Clone, Serialize)]
pub struct SetupConfig {
    /// Serve the setup UI (feature flag).
    pub enabled: bool,

    /// Directory holding the active gateway build; CLI calls run here.
    pub active_dir: PathBuf,

    /// State directory; the `.env` file lives here.
    pub state_dir: PathBuf,

    /// Gateway configuration file. Its absence triggers first-run capture.
    pub config_path: PathBuf,

    /// Maximum accepted setup API request body, in bytes.
    pub max_body_bytes: usize,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            active_dir: PathBuf::from("/config/clawdbot/source/active"),
            state_dir: PathBuf::from("/config/clawdbot/data/state"),
            config_path: PathBuf::from("/config/clawdbot/data/clawdbot.json"),
            max_body_bytes: 256 * 1024,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ObservabilityConfig {
    /// Prometheus exporter address; metrics export is off when unset.
    pub metrics_address: Option<String>,

    /// Log output format.
    pub log_format: LogFormat,
}

//! Configuration loading from command-line flags and the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{ArgAction, Parser};
use thiserror::Error;

use crate::config::schema::{
    GatewayConfig, ListenerConfig, LogFormat, ObservabilityConfig, ProxyConfig, SetupConfig,
};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("Failed to resolve {what} address {authority}: {source}")]
    Resolve {
        what: &'static str,
        authority: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{what} address {authority} resolved to nothing")]
    Unresolvable { what: &'static str, authority: String },
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Command-line flags; every flag falls back to an environment variable.
#[derive(Debug, Clone, Parser)]
#[command(name = "setup-proxy")]
#[command(about = "Reverse proxy for the gateway with an optional first-run setup UI")]
pub struct ProxyArgs {
    #[arg(long, env = "SETUP_PROXY_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "SETUP_PROXY_PORT", default_value_t = 8099)]
    pub port: u16,

    #[arg(long, env = "GATEWAY_HOST", default_value = "127.0.0.1")]
    pub gateway_host: String,

    #[arg(long, env = "GATEWAY_PORT", default_value_t = 18789)]
    pub gateway_port: u16,

    /// Serve the setup UI under /__setup. Only "true" enables it.
    #[arg(
        long,
        env = "EASY_SETUP_UI",
        default_value = "false",
        value_parser = parse_flag,
        action = ArgAction::Set
    )]
    pub easy_setup_ui: bool,

    #[arg(long, env = "CLAWDBOT_ACTIVE_DIR", default_value = "/config/clawdbot/source/active")]
    pub active_dir: PathBuf,

    #[arg(long, env = "CLAWDBOT_STATE_DIR", default_value = "/config/clawdbot/data/state")]
    pub state_dir: PathBuf,

    #[arg(long, env = "CLAWDBOT_CONFIG_PATH", default_value = "/config/clawdbot/data/clawdbot.json")]
    pub config_path: PathBuf,

    #[arg(long, env = "SETUP_CLI_PROGRAM", default_value = "pnpm")]
    pub cli_program: String,

    #[arg(long, env = "SETUP_CALL_TIMEOUT_SECS", default_value_t = 60)]
    pub call_timeout_secs: u64,

    #[arg(long, env = "SETUP_MAX_BODY_BYTES", default_value_t = 256 * 1024)]
    pub max_body_bytes: usize,

    #[arg(long, env = "SETUP_PROXY_MAX_CONNECTIONS", default_value_t = 1024)]
    pub max_connections: usize,

    /// Prometheus exporter address (e.g. 127.0.0.1:9099).
    #[arg(long, env = "SETUP_PROXY_METRICS_ADDRESS")]
    pub metrics_address: Option<String>,

    /// Log format: "pretty" or "json".
    #[arg(long, env = "SETUP_PROXY_LOG_FORMAT", default_value = "pretty", value_parser = parse_log_format)]
    pub log_format: LogFormat,
}

/// Anything other than a case-insensitive "true" counts as off.
fn parse_flag(value: &str) -> Result<bool, String> {
    Ok(value.trim().eq_ignore_ascii_case("true"))
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "pretty" => Ok(LogFormat::Pretty),
        "json" => Ok(LogFormat::Json),
        other => Err(format!("unknown log format {other:?} (expected pretty or json)")),
    }
}

impl From<ProxyArgs> for ProxyConfig {
    fn from(args: ProxyArgs) -> Self {
        Self {
            listener: ListenerConfig {
                host: args.host,
                port: args.port,
                max_connections: args.max_connections,
            },
            gateway: GatewayConfig {
                host: args.gateway_host,
                port: args.gateway_port,
                cli_program: args.cli_program,
                call_timeout_secs: args.call_timeout_secs,
            },
            setup: SetupConfig {
                enabled: args.easy_setup_ui,
                active_dir: args.active_dir,
                state_dir: args.state_dir,
                config_path: args.config_path,
                max_body_bytes: args.max_body_bytes,
            },
            observability: ObservabilityConfig {
                metrics_address: args.metrics_address,
                log_format: args.log_format,
            },
        }
    }
}

/// Build and validate configuration from parsed flags.
pub fn load_config(args: ProxyArgs) -> Result<ProxyConfig, ConfigError> {
    let config = ProxyConfig::from(args);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Socket addresses resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAddrs {
    pub listen: SocketAddr,
    pub backend: SocketAddr,
}

/// Resolve the listener and backend addresses. Called once; the proxy never
/// looks them up again.
pub async fn resolve_addrs(config: &ProxyConfig) -> Result<ResolvedAddrs, ConfigError> {
    let listen = resolve_one("listener", config.listener.authority()).await?;
    let backend = resolve_one("gateway", config.gateway.authority()).await?;
    Ok(ResolvedAddrs { listen, backend })
}

async fn resolve_one(what: &'static str, authority: String) -> Result<SocketAddr, ConfigError> {
    let mut addrs = tokio::net::lookup_host(authority.clone())
        .await
        .map_err(|source| ConfigError::Resolve {
            what,
            authority: authority.clone(),
            source,
        })?;
    addrs
        .next()
        .ok_or(ConfigError::Unresolvable { what, authority })
}

//! Downstream call client for the gateway RPC methods.

use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::config::ProxyConfig;
use crate::gateway::runner::CliRunner;
use crate::gateway::types::CallResult;
use crate::observability::metrics;

/// Per-call options.
#[derive(Debug, Default)]
pub struct CallOptions {
    /// Optional gateway bearer token, passed through opaquely.
    pub token: Option<SecretString>,
    /// Overrides the configured call timeout.
    pub timeout: Option<Duration>,
}

/// Invokes gateway RPC methods through the gateway CLI.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    runner: CliRunner,
    gateway_url: String,
    default_timeout: Duration,
}

impl GatewayClient {
    pub fn new(runner: CliRunner, gateway_url: impl Into<String>, default_timeout: Duration) -> Self {
        Self {
            runner,
            gateway_url: gateway_url.into(),
            default_timeout,
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(
            CliRunner::new(&config.gateway.cli_program, &config.setup.active_dir),
            config.gateway.ws_url(),
            config.gateway.call_timeout(),
        )
    }

    /// Call `method` with `params`. Never fails: problems come back as
    /// `success = false` with diagnostics in `stderr`.
    pub async fn call(&self, method: &str, params: &Value, options: CallOptions) -> CallResult {
        let mut args = vec![
            "clawdbot".to_string(),
            "gateway".to_string(),
            "call".to_string(),
            method.to_string(),
            "--url".to_string(),
            self.gateway_url.clone(),
            "--params".to_string(),
            params.to_string(),
            "--json".to_string(),
        ];
        if let Some(token) = &options.token {
            args.push("--token".to_string());
            args.push(token.expose_secret().clone());
        }

        tracing::debug!(
            method = %method,
            has_token = options.token.is_some(),
            "Calling gateway"
        );

        let timeout = options.timeout.unwrap_or(self.default_timeout);
        let start = Instant::now();
        let mut result = CallResult::from_output(self.runner.run(&args, timeout).await);
        if let Some(token) = &options.token {
            result.redact(token.expose_secret());
        }

        metrics::record_gateway_call(method, result.success, start);
        log_result(method, &result);
        result
    }

    /// `clawdbot models status --json`: model and auth overview.
    pub async fn models_status(&self, timeout: Option<Duration>) -> CallResult {
        let args = ["clawdbot", "models", "status", "--json"].map(String::from);
        let start = Instant::now();
        let result = CallResult::from_output(
            self.runner
                .run(&args, timeout.unwrap_or(self.default_timeout))
                .await,
        );
        metrics::record_gateway_call("models.status", result.success, start);
        log_result("models.status", &result);
        result
    }
}

fn log_result(method: &str, result: &CallResult) {
    if result.success {
        tracing::debug!(method = %method, parsed = result.payload.is_some(), "Gateway call succeeded");
    } else {
        tracing::warn!(method = %method, exit_code = result.exit_code, "Gateway call failed");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    /// `sh clawdbot ...` runs a script named `clawdbot` from the working
    /// directory, standing in for `pnpm clawdbot ...`.
    fn client_with_script(script: &str) -> (tempfile::TempDir, GatewayClient) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("clawdbot"), script).unwrap();
        let client = GatewayClient::new(
            CliRunner::new("sh", dir.path()),
            "ws://127.0.0.1:18789",
            Duration::from_secs(5),
        );
        (dir, client)
    }

    #[tokio::test]
    async fn test_call_passes_method_and_params() {
        let (_dir, client) = client_with_script(
            "printf '{\"cmd\":\"%s %s\",\"method\":\"%s\",\"url\":\"%s\",\"params\":%s,\"last\":\"%s\"}' \"$1\" \"$2\" \"$3\" \"$5\" \"$7\" \"$8\"\n",
        );
        let result = client
            .call("wizard.start", &json!({"mode": "local"}), CallOptions::default())
            .await;
        assert!(result.success);
        assert_eq!(
            result.payload,
            Some(json!({
                "cmd": "gateway call",
                "method": "wizard.start",
                "url": "ws://127.0.0.1:18789",
                "params": {"mode": "local"},
                "last": "--json",
            }))
        );
    }

    #[tokio::test]
    async fn test_token_is_passed_and_redacted() {
        let (_dir, client) = client_with_script("echo \"bad token $9 ${10}\" >&2\nexit 1\n");
        let options = CallOptions {
            token: Some(SecretString::new("s3cr3t".into())),
            timeout: None,
        };
        let result = client.call("wizard.status", &json!({}), options).await;
        assert!(!result.success);
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.stderr, "bad token --token [redacted]\n");
    }

    #[tokio::test]
    async fn test_timeout_yields_failed_result() {
        let (_dir, client) = client_with_script("exec sleep 10\n");
        let options = CallOptions {
            token: None,
            timeout: Some(Duration::from_millis(200)),
        };
        let result = client.call("wizard.next", &json!({}), options).await;
        assert!(!result.success);
        assert_eq!(result.payload, None);
    }

    #[tokio::test]
    async fn test_models_status_args() {
        let (_dir, client) = client_with_script("printf '{\"args\":\"%s\"}' \"$*\"\n");
        let result = client.models_status(None).await;
        assert_eq!(result.payload, Some(json!({"args": "models status --json"})));
    }
}

//! Setup API handlers.
//!
//! Each handler is independent: it reads its body, makes at most one
//! downstream call or one state-file write, and answers with JSON.

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::config::ProxyConfig;
use crate::gateway::{CallOptions, GatewayClient};
use crate::http::response::{json_response, text_response, HTML_CONTENT_TYPE};
use crate::setup::envelope::CallReport;
use crate::setup::error::SetupError;
use crate::setup::page::SETUP_HTML;
use crate::store::{apply_updates, Updates};

pub const ANTHROPIC_KEY_VAR: &str = "ANTHROPIC_API_KEY";
pub const OPENAI_KEY_VAR: &str = "OPENAI_API_KEY";

const API_PREFIX: &str = "/__setup/api/";

/// State shared by the setup handlers.
#[derive(Clone)]
pub struct SetupState {
    pub config: Arc<ProxyConfig>,
    pub gateway: GatewayClient,
}

impl SetupState {
    pub fn new(config: Arc<ProxyConfig>) -> Self {
        let gateway = GatewayClient::from_config(&config);
        Self { config, gateway }
    }
}

#[derive(Serialize)]
struct HostPort {
    host: String,
    port: u16,
}

#[derive(Serialize)]
struct GatewayInfo {
    host: String,
    port: u16,
    url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvReport {
    ok: bool,
    easy_setup_ui: bool,
    proxy: HostPort,
    gateway: GatewayInfo,
    active_dir: String,
    active_dir_exists: bool,
    state_dir: String,
    config_path: String,
    config_exists: bool,
    env_path: String,
}

/// `GET /__setup/api/env`
pub async fn env(State(state): State<SetupState>) -> Response {
    let config = &state.config;
    let report = EnvReport {
        ok: true,
        easy_setup_ui: config.setup.enabled,
        proxy: HostPort {
            host: config.listener.host.clone(),
            port: config.listener.port,
        },
        gateway: GatewayInfo {
            host: config.gateway.host.clone(),
            port: config.gateway.port,
            url: config.gateway.ws_url(),
        },
        active_dir: display(&config.setup.active_dir),
        active_dir_exists: config.setup.active_dir.exists(),
        state_dir: display(&config.setup.state_dir),
        config_path: display(&config.setup.config_path),
        config_exists: config.setup.config_path.exists(),
        env_path: display(&config.env_path()),
    };
    json_response(StatusCode::OK, &report)
}

/// `GET /__setup/api/models/status`
pub async fn models_status(State(state): State<SetupState>) -> CallReport {
    let timeout = state.config.gateway.call_timeout();
    let result = state.gateway.models_status(Some(timeout)).await;
    CallReport::new(result, "models status")
}

/// `POST /__setup/api/wizard/start`
pub async fn wizard_start(
    State(state): State<SetupState>,
    body: Body,
) -> Result<CallReport, SetupError> {
    let request = WizardRequest::read(body, &state.config).await?;
    let params = request
        .params
        .unwrap_or_else(|| json!({ "mode": "local", "flow": "quickstart" }));
    Ok(wizard_call(&state, "wizard.start", params, request.token).await)
}

/// `POST /__setup/api/wizard/status`
pub async fn wizard_status(
    State(state): State<SetupState>,
    body: Body,
) -> Result<CallReport, SetupError> {
    let request = WizardRequest::read(body, &state.config).await?;
    Ok(wizard_call(&state, "wizard.status", json!({}), request.token).await)
}

/// `POST /__setup/api/wizard/cancel`
pub async fn wizard_cancel(
    State(state): State<SetupState>,
    body: Body,
) -> Result<CallReport, SetupError> {
    let request = WizardRequest::read(body, &state.config).await?;
    Ok(wizard_call(&state, "wizard.cancel", json!({}), request.token).await)
}

/// `POST /__setup/api/wizard/next`
pub async fn wizard_next(
    State(state): State<SetupState>,
    body: Body,
) -> Result<CallReport, SetupError> {
    let request = WizardRequest::read(body, &state.config).await?;
    let params = request.params.unwrap_or_else(|| json!({}));
    Ok(wizard_call(&state, "wizard.next", params, request.token).await)
}

async fn wizard_call(
    state: &SetupState,
    method: &str,
    params: Value,
    token: Option<SecretString>,
) -> CallReport {
    let options = CallOptions {
        token,
        timeout: Some(state.config.gateway.call_timeout()),
    };
    let result = state.gateway.call(method, &params, options).await;
    CallReport::new(result, method).with_actions()
}

/// `POST /__setup/api/keys`
pub async fn keys(State(state): State<SetupState>, body: Body) -> Result<Response, SetupError> {
    let Some(Value::Object(fields)) = read_json(body, state.config.setup.max_body_bytes).await?
    else {
        return Err(SetupError::InvalidJson);
    };

    let mut updates = Updates::new();
    for (field, var) in [("anthropicKey", ANTHROPIC_KEY_VAR), ("openaiKey", OPENAI_KEY_VAR)] {
        if let Some(secret) = secret_field(&fields, field) {
            updates.insert(var.to_string(), Some(secret.expose_secret().clone()));
        }
    }
    if updates.is_empty() {
        return Err(SetupError::NoKeysProvided);
    }

    let path = state.config.env_path();
    let target = path.clone();
    tokio::task::spawn_blocking(move || apply_updates(&target, &updates))
        .await
        .map_err(|e| SetupError::Internal(e.to_string()))??;

    Ok(json_response(
        StatusCode::OK,
        &json!({ "ok": true, "message": "saved", "path": display(&path) }),
    ))
}

/// Unknown method on a known endpoint.
pub async fn not_found() -> SetupError {
    SetupError::NotFound
}

/// Everything else in setup mode: unknown API paths get JSON 404, the rest
/// get the setup page.
pub async fn fallback(uri: Uri) -> Response {
    if uri.path().starts_with(API_PREFIX) {
        SetupError::NotFound.into_response()
    } else {
        text_response(StatusCode::OK, SETUP_HTML, HTML_CONTENT_TYPE)
    }
}

/// Lenient view of a wizard request body. Anything unparseable means
/// "no token, default params".
#[derive(Debug, Default)]
struct WizardRequest {
    token: Option<SecretString>,
    params: Option<Value>,
}

impl WizardRequest {
    async fn read(body: Body, config: &ProxyConfig) -> Result<Self, SetupError> {
        Ok(Self::from_value(read_json(body, config.setup.max_body_bytes).await?))
    }

    fn from_value(value: Option<Value>) -> Self {
        let Some(Value::Object(fields)) = value else {
            return Self::default();
        };
        let token = fields
            .get("token")
            .and_then(scalar_text)
            .filter(|t| !t.is_empty())
            .map(SecretString::new);
        let params = fields.get("params").filter(|p| p.is_object()).cloned();
        Self { token, params }
    }
}

/// Read at most `limit` bytes and parse as JSON. `Ok(None)` when the body is
/// not JSON; the caller decides whether that is an error.
async fn read_json(body: Body, limit: usize) -> Result<Option<Value>, SetupError> {
    let bytes = match Limited::new(body, limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            return Err(SetupError::BodyTooLarge { limit });
        }
        Err(e) => return Err(SetupError::Internal(format!("failed to read body: {e}"))),
    };
    Ok(serde_json::from_slice(&bytes).ok())
}

/// A trimmed, non-empty field, kept out of Debug output.
fn secret_field(fields: &Map<String, Value>, name: &str) -> Option<SecretString> {
    fields
        .get(name)
        .and_then(scalar_text)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(SecretString::new)
}

/// Text form of a set scalar. `false`, `0`, null and containers count as
/// unset.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(true) => Some("true".to_string()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wizard_request_is_lenient() {
        let request = WizardRequest::from_value(None);
        assert!(request.token.is_none() && request.params.is_none());

        let request = WizardRequest::from_value(Some(json!({"token": "", "params": [1]})));
        assert!(request.token.is_none());
        assert!(request.params.is_none());

        let request = WizardRequest::from_value(Some(json!({"token": 0, "params": null})));
        assert!(request.token.is_none() && request.params.is_none());

        let request = WizardRequest::from_value(Some(json!({"token": 5})));
        assert_eq!(request.token.unwrap().expose_secret(), "5");

        let request =
            WizardRequest::from_value(Some(json!({"token": "t", "params": {"choice": "x"}})));
        assert_eq!(request.token.unwrap().expose_secret(), "t");
        assert_eq!(request.params, Some(json!({"choice": "x"})));
    }

    #[test]
    fn test_secret_field_trims_and_skips_empty() {
        let fields = json!({"a": "  key  ", "b": "   ", "c": 42, "d": false, "e": {"x": 1}})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(secret_field(&fields, "a").unwrap().expose_secret(), "key");
        assert!(secret_field(&fields, "b").is_none());
        assert_eq!(secret_field(&fields, "c").unwrap().expose_secret(), "42");
        assert!(secret_field(&fields, "d").is_none());
        assert!(secret_field(&fields, "e").is_none());
        assert!(secret_field(&fields, "missing").is_none());
    }

    #[tokio::test]
    async fn test_read_json_limits() {
        let value = read_json(Body::from("{\"a\":1}"), 64).await.unwrap();
        assert_eq!(value, Some(json!({"a": 1})));

        assert_eq!(read_json(Body::from("not json"), 64).await.unwrap(), None);
        assert_eq!(read_json(Body::empty(), 64).await.unwrap(), None);

        let err = read_json(Body::from(vec![b' '; 65]), 64).await.unwrap_err();
        assert!(matches!(err, SetupError::BodyTooLarge { limit: 64 }));
    }
}

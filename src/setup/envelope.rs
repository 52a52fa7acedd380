//! Response envelope for gateway-backed setup endpoints.
//!
//! The gateway's payload is opaque. The only thing read out of it is a
//! best-effort list of next-step actions for the setup page, and that
//! extraction never fails: unknown shapes simply yield no actions.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::gateway::CallResult;
use crate::http::response::json_response;

/// Diagnostic output returned to clients is cut to this many lines.
pub const STDERR_MAX_LINES: usize = 50;

const DEFAULT_ACTION_LABEL: &str = "Continue";
const LABEL_FIELDS: [&str; 5] = ["label", "title", "name", "text", "id"];

/// One clickable next step offered by the wizard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WizardAction {
    pub label: String,
    /// Parameters to send to `wizard.next` when this action is chosen.
    pub params: Value,
}

/// Uniform body of every gateway-backed endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CallReport {
    pub ok: bool,
    pub code: i32,
    pub json: Option<Value>,
    pub message: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<WizardAction>,
}

impl CallReport {
    /// `label` names the operation in the failure message.
    pub fn new(result: CallResult, label: &str) -> Self {
        let message = if result.success {
            "ok".to_string()
        } else {
            format!("{label} failed")
        };
        Self {
            ok: result.success,
            code: result.exit_code,
            stderr: truncate_lines(&result.stderr, STDERR_MAX_LINES),
            json: result.payload,
            message,
            actions: Vec::new(),
        }
    }

    /// Attach the actions found in the payload, if any.
    pub fn with_actions(mut self) -> Self {
        if let Some(payload) = &self.json {
            self.actions = extract_actions(payload);
        }
        self
    }

    pub fn status(&self) -> StatusCode {
        if self.ok {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for CallReport {
    fn into_response(self) -> Response {
        json_response(self.status(), &self)
    }
}

/// Keep the first `max` lines (`\n` or `\r\n` separated). When lines are
/// dropped, a final marker line says how many.
pub fn truncate_lines(text: &str, max: usize) -> String {
    let lines: Vec<&str> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();
    if lines.len() <= max {
        return lines.join("\n");
    }
    let dropped = lines.len() - max;
    let mut out = lines[..max].join("\n");
    out.push_str(&format!("\n[{dropped} more lines truncated]"));
    out
}

/// Collect next-step actions from a wizard payload.
///
/// Looks at `actions`, `step.actions`, `step.choices` and `step.options`.
/// String items become `{label: s, params: {choice: s}}`; object items need
/// a `next`, `params` or `value` to be usable.
pub fn extract_actions(payload: &Value) -> Vec<WizardAction> {
    let Some(root) = payload.as_object() else {
        return Vec::new();
    };

    let mut lists: Vec<&Vec<Value>> = Vec::new();
    if let Some(Value::Array(items)) = root.get("actions") {
        lists.push(items);
    }
    if let Some(Value::Object(step)) = root.get("step") {
        for key in ["actions", "choices", "options"] {
            if let Some(Value::Array(items)) = step.get(key) {
                lists.push(items);
            }
        }
    }

    lists
        .into_iter()
        .flatten()
        .filter(|item| is_truthy(item))
        .filter_map(action_from_item)
        .collect()
}

fn action_from_item(item: &Value) -> Option<WizardAction> {
    match item {
        Value::String(s) => Some(WizardAction {
            label: s.clone(),
            params: json!({ "choice": s }),
        }),
        Value::Object(fields) => {
            let params = action_params(fields)?;
            Some(WizardAction {
                label: action_label(fields),
                params,
            })
        }
        _ => None,
    }
}

fn action_label(fields: &Map<String, Value>) -> String {
    LABEL_FIELDS
        .iter()
        .filter_map(|key| fields.get(*key))
        .find(|v| is_truthy(v))
        .map(display_value)
        .unwrap_or_else(|| DEFAULT_ACTION_LABEL.to_string())
}

fn action_params(fields: &Map<String, Value>) -> Option<Value> {
    let chosen = ["next", "params"]
        .iter()
        .filter_map(|key| fields.get(*key))
        .find(|v| is_truthy(v))
        .cloned()
        .or_else(|| match fields.get("value") {
            Some(Value::Null) | None => None,
            Some(value) => Some(json!({ "value": value })),
        })?;
    match chosen {
        Value::Object(_) | Value::Array(_) => Some(chosen),
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

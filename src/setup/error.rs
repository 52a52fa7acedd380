//! Setup API errors and their wire form.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::http::response::json_response;
use crate::store::StoreError;

/// Client-facing failures of the setup API. Each maps to a stable code.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("request body is not a JSON object")]
    InvalidJson,

    #[error("no API key provided")]
    NoKeysProvided,

    #[error("value for {key} contains a line break")]
    InvalidValue { key: String },

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("failed to persist keys: {0}")]
    WriteFailed(#[source] StoreError),

    #[error("no such setup endpoint")]
    NotFound,

    #[error("internal error: {0}")]
    Internal(String),
}

impl SetupError {
    pub fn code(&self) -> &'static str {
        match self {
            SetupError::InvalidJson => "invalid_json",
            SetupError::NoKeysProvided => "no_keys_provided",
            SetupError::InvalidValue { .. } => "invalid_value",
            SetupError::BodyTooLarge { .. } => "body_too_large",
            SetupError::WriteFailed(_) => "write_failed",
            SetupError::NotFound => "not_found",
            SetupError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            SetupError::InvalidJson
            | SetupError::NoKeysProvided
            | SetupError::InvalidValue { .. } => StatusCode::BAD_REQUEST,
            SetupError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            SetupError::NotFound => StatusCode::NOT_FOUND,
            SetupError::WriteFailed(_) | SetupError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<StoreError> for SetupError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::LineBreak { key } => SetupError::InvalidValue { key },
            other => SetupError::WriteFailed(other),
        }
    }
}

impl IntoResponse for SetupError {
    fn into_response(self) -> Response {
        match &self {
            SetupError::WriteFailed(_) | SetupError::Internal(_) => {
                tracing::error!(error = %self, "Setup request failed");
            }
            _ => tracing::debug!(error = %self, "Setup request rejected"),
        }
        json_response(self.status(), &json!({ "ok": false, "error": self.code() }))
    }
}

//! Response construction shared by the setup API and the proxy paths.
//!
//! # Design Decisions
//! - JSON bodies are pretty-printed; they are read by people in the setup page
//! - Every locally generated response is `cache-control: no-store`

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Serialize `payload` as pretty JSON with the given status.
pub fn json_response<T: Serialize>(status: StatusCode, payload: &T) -> Response {
    match serde_json::to_string_pretty(payload) {
        Ok(body) => body_response(status, JSON_CONTENT_TYPE, Body::from(body)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize JSON response");
            body_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                JSON_CONTENT_TYPE,
                Body::from("{\"ok\":false,\"error\":\"internal_error\"}"),
            )
        }
    }
}

pub fn text_response(status: StatusCode, body: impl Into<Body>, content_type: &'static str) -> Response {
    body_response(status, content_type, body.into())
}

/// 302 to `location`.
pub fn redirect(location: HeaderValue) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

fn body_response(status: StatusCode, content_type: &'static str, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

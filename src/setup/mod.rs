//! Setup UI and API, served locally while setup mode is active.
//!
//! # Data Flow
//! ```text
//! request claimed by the mode selector
//!     → router() (axum routes under /__setup/api/)
//!     → handlers.rs
//!         → gateway::GatewayClient (wizard.*, models status)
//!         → store::apply_updates (API keys)
//!     → envelope.rs (CallReport + best-effort wizard actions)
//!     → JSON response, no-store, x-request-id
//! ```
//!
//! # Security Constraints
//! - Key values never reach a response or a log line
//! - Diagnostic output is truncated and scrubbed of the caller's token

pub mod envelope;
pub mod error;
pub mod handlers;
pub mod page;

use axum::http::{header, HeaderValue};
use axum::routing::{get, post};
use axum::Router;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::http::request::UuidRequestId;

pub use envelope::{extract_actions, CallReport, WizardAction};
pub use error::SetupError;
pub use handlers::SetupState;

/// Build the setup router. Paths are absolute (`/__setup/...`); the whole
/// request URI is routed, including paths captured during first run.
pub fn router(state: SetupState) -> Router {
    use handlers::*;

    Router::new()
        .route("/__setup/api/env", get(env).fallback(not_found))
        .route("/__setup/api/models/status", get(models_status).fallback(not_found))
        .route("/__setup/api/wizard/start", post(wizard_start).fallback(not_found))
        .route("/__setup/api/wizard/status", post(wizard_status).fallback(not_found))
        .route("/__setup/api/wizard/cancel", post(wizard_cancel).fallback(not_found))
        .route("/__setup/api/wizard/next", post(wizard_next).fallback(not_found))
        .route("/__setup/api/keys", post(keys).fallback(not_found))
        .fallback(fallback)
        .with_state(state)
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
}

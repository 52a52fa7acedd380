//! Request identification.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for every setup API request
//! - Keep an incoming `x-request-id` when the client already sent one
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Proxied traffic is left untouched; only locally served requests get an ID

use axum::http::{HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Makes UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper HTTP/1.1, dispatch by mode)
//!         → setup router          (crate::setup)
//!         → proxy.rs              (plain HTTP to the gateway)
//!         → websocket.rs          (upgrade handshake + byte splice)
//!               → handshake.rs    (raw request/response heads)
//!     → response.rs / request.rs (local responses, request IDs)
//! ```

pub mod handshake;
pub mod proxy;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use request::UuidRequestId;
pub use server::{dispatch, AppState, HttpServer, ProxyError};

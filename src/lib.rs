//! Setup proxy library.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod routing;

// Setup mode
pub mod gateway;
pub mod setup;
pub mod store;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;

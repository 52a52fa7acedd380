//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! CLI flags / environment variables
//!     → loader.rs (clap parse, map onto schema)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → loader::resolve_addrs (DNS once, at startup)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no runtime reconfiguration
//! - All fields have defaults matching the add-on's documented defaults
//! - Validation separates syntactic (clap) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, resolve_addrs, ConfigError, ProxyArgs, ResolvedAddrs};
pub use schema::{
    GatewayConfig, ListenerConfig, LogFormat, ObservabilityConfig, ProxyConfig, SetupConfig,
    SETUP_PREFIX,
};

//! Downstream gateway integration.
//!
//! # Data Flow
//! ```text
//! setup handler (method, params, token?)
//!     → client.rs (build CLI arguments, pick timeout)
//!     → runner.rs (spawn in active dir, capture output, kill on deadline)
//!     → types.rs (CallResult: exit status + best-effort JSON payload)
//! ```
//!
//! # Security Constraints
//! - Tokens travel only in the CLI argument list
//! - Never log tokens; captured output is scrubbed before it leaves
//! - A failed or hung call never takes the proxy down

pub mod client;
pub mod runner;
pub mod types;

pub use client::{CallOptions, GatewayClient};
pub use runner::{CliRunner, CommandOutput, NO_EXIT_CODE};
pub use types::CallResult;

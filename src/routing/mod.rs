//! Routing subsystem: the mode selector.
//!
//! # Data Flow
//! ```text
//! Incoming request (path, upgrade?)
//!     → mode.rs (setup flag + config file existence)
//!     → matcher.rs (namespace prefix / exact root)
//!     → Decision: RedirectToSetupRoot | Setup | Proxy
//!       UpgradeDecision: Reject | Proxy
//! ```
//!
//! # Design Decisions
//! - The setup flag is static; only the config file check is dynamic
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same path and filesystem state always give the same decision

pub mod matcher;
pub mod mode;

pub use mode::{Decision, ModeSelector, UpgradeDecision};

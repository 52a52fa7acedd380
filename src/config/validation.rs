//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (clap/serde handle syntactic)
//! - Validate value ranges (timeouts > 0, ports valid, limits > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: &ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.host.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "listener.host" });
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::Zero { field: "listener.max_connections" });
    }
    if config.gateway.host.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "gateway.host" });
    }
    if config.gateway.port == 0 {
        errors.push(ValidationError::Zero { field: "gateway.port" });
    }
    if config.gateway.cli_program.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "gateway.cli_program" });
    }
    if config.gateway.call_timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "gateway.call_timeout_secs" });
    }
    if config.setup.max_body_bytes == 0 {
        errors.push(ValidationError::Zero { field: "setup.max_body_bytes" });
    }
    if config.setup.state_dir.as_os_str().is_empty() {
        errors.push(ValidationError::Empty { field: "setup.state_dir" });
    }
    if config.setup.config_path.as_os_str().is_empty() {
        errors.push(ValidationError::Empty { field: "setup.config_path" });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

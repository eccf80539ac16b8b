//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: NodeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::NodeConfig;

/// A single semantic problem in the node configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} is not a valid socket address: {value}")]
    BadAddress { field: &'static str, value: String },

    #[error("battery_percent must be at most 100, got {0}")]
    BatteryOutOfRange(u8),
}

/// Check every field and collect all problems.
pub fn validate_config(config: &NodeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let nonzero: [(&'static str, u64); 11] = [
        ("portal.max_line_bytes", config.portal.max_line_bytes as u64),
        ("portal.max_header_bytes", config.portal.max_header_bytes as u64),
        ("portal.max_body_bytes", config.portal.max_body_bytes as u64),
        ("portal.read_idle_ms", config.portal.read_idle_ms),
        ("portal.request_timeout_ms", config.portal.request_timeout_ms),
        ("upload.chunk_size", config.upload.chunk_size as u64),
        ("upload.connect_timeout_ms", config.upload.connect_timeout_ms),
        ("upload.write_timeout_ms", config.upload.write_timeout_ms),
        ("upload.response_idle_ms", config.upload.response_idle_ms),
        ("upload.max_response_bytes", config.upload.max_response_bytes as u64),
        ("upload.max_line_bytes", config.upload.max_line_bytes as u64),
    ];
    for (field, value) in nonzero {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if config.portal.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BadAddress {
            field: "portal.bind_address",
            value: config.portal.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::BadAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.device.battery_percent > 100 {
        errors.push(ValidationError::BatteryOutOfRange(config.device.battery_percent));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

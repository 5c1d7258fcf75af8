//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals, timeouts, thresholds > 0)
//! - Reject empty or duplicate backend addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BalancerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{BalancerConfig, PLACEHOLDER_API_KEY};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("proxy.bind_address '{0}' is not a socket address")]
    ProxyBindAddress(String),

    #[error("proxy.bind_address '{0}' is already used by listener.bind_address")]
    ProxyBindConflict(String),

    #[error("backend address must not be empty")]
    EmptyBackendAddress,

    #[error("backend '{0}' is listed more than once")]
    DuplicateBackend(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("retries.base_delay_ms ({base}) exceeds retries.max_delay_ms ({max})")]
    BackoffRange { base: u64, max: u64 },

    #[error("observability.metrics_path '{0}' must start with '/' and not collide with another route")]
    MetricsPath(String),

    #[error("admin.api_key must be set to a non-placeholder value when admin.enabled = true")]
    AdminApiKey,
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    let proxy = &config.proxy;
    if proxy.enabled {
        if proxy.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::ProxyBindAddress(proxy.bind_address.clone()));
        } else if proxy.bind_address == config.listener.bind_address {
            errors.push(ValidationError::ProxyBindConflict(proxy.bind_address.clone()));
        }
        if proxy.request_timeout_secs == 0 {
            errors.push(ValidationError::Zero { field: "proxy.request_timeout_secs" });
        }
        if proxy.max_body_bytes == 0 {
            errors.push(ValidationError::Zero { field: "proxy.max_body_bytes" });
        }
    }

    let mut seen = HashSet::new();
    for backend in &config.backends {
        let address = backend.address.trim();
        if address.is_empty() {
            errors.push(ValidationError::EmptyBackendAddress);
        } else if !seen.insert(address) {
            errors.push(ValidationError::DuplicateBackend(address.to_string()));
        }
    }

    let hc = &config.health_check;
    if hc.interval_secs == 0 {
        errors.push(ValidationError::Zero { field: "health_check.interval_secs" });
    }
    if hc.timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "health_check.timeout_secs" });
    }
    if hc.unhealthy_threshold == 0 {
        errors.push(ValidationError::Zero { field: "health_check.unhealthy_threshold" });
    }

    let retries = &config.retries;
    if retries.max_attempts == 0 {
        errors.push(ValidationError::Zero { field: "retries.max_attempts" });
    }
    if retries.base_delay_ms > retries.max_delay_ms {
        errors.push(ValidationError::BackoffRange {
            base: retries.base_delay_ms,
            max: retries.max_delay_ms,
        });
    }

    let metrics_path = &config.observability.metrics_path;
    if !metrics_path.starts_with('/')
        || metrics_path == "/health"
        || metrics_path.starts_with("/admin")
    {
        errors.push(ValidationError::MetricsPath(metrics_path.clone()));
    }

    let admin = &config.admin;
    if admin.enabled && (admin.api_key.trim().is_empty() || admin.api_key == PLACEHOLDER_API_KEY) {
        errors.push(ValidationError::AdminApiKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

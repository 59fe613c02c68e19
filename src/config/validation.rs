//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (poll interval > 0)
//! - Validate addresses (identity extras, probe, metrics endpoint)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EngineConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::{IpAddr, SocketAddr};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::schema::EngineConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("rules.path must not be empty")]
    EmptyRulesPath,

    #[error("rules.poll_interval_secs must be greater than zero")]
    ZeroPollInterval,

    #[error("identity.extra_addresses contains invalid IP '{0}'")]
    InvalidExtraAddress(String),

    #[error("identity.probe_address '{0}' is not a socket address")]
    InvalidProbeAddress(String),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),

    #[error("observability.log_level '{0}' is not a valid filter")]
    InvalidLogLevel(String),
}

/// Check every semantic constraint and collect all failures.
pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.rules.path.trim().is_empty() {
        errors.push(ValidationError::EmptyRulesPath);
    }
    if config.rules.poll_interval_secs == 0 {
        errors.push(ValidationError::ZeroPollInterval);
    }

    for extra in &config.identity.extra_addresses {
        if extra.parse::<IpAddr>().is_err() {
            errors.push(ValidationError::InvalidExtraAddress(extra.clone()));
        }
    }
    if config.identity.probe_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidProbeAddress(config.identity.probe_address.clone()));
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(observability.metrics_address.clone()));
    }
    if EnvFilter::try_new(&observability.log_level).is_err() {
        errors.push(ValidationError::InvalidLogLevel(observability.log_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

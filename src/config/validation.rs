//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, worker cap > 0)
//! - Parse every target string so malformed targets abort startup
//! - Detect conflicting output filters
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MonitorConfig → Result<(), Vec<ValidationError>>
//! - Runs before any monitor starts

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::MonitorConfig;
use crate::probe::{Target, TargetDefaults, TargetError};

/// A single semantic problem in the configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("only_online and only_offline are mutually exclusive")]
    ConflictingFilters,

    #[error("no targets configured")]
    NoTargets,

    #[error("invalid target: {0}")]
    Target(#[from] TargetError),

    #[error("invalid metrics_address {0:?}")]
    MetricsAddress(String),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &MonitorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let positive = [
        ("probe.timeout_ms", config.probe.timeout_ms),
        ("monitor.interval_ms", config.monitor.interval_ms),
        ("monitor.down_threshold_ms", config.monitor.down_threshold_ms),
        ("batch.timeout_ms", config.batch.timeout_ms),
        ("batch.max_concurrent", config.batch.max_concurrent as u64),
        ("output.refresh_ms", config.output.refresh_ms),
        ("journal.flush_interval_ms", config.journal.flush_interval_ms),
        ("journal.queue_capacity", config.journal.queue_capacity as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    if config.batch.deadline_secs == Some(0) {
        errors.push(ValidationError::Zero("batch.deadline_secs"));
    }

    if config.output.only_online && config.output.only_offline {
        errors.push(ValidationError::ConflictingFilters);
    }

    if config.targets.is_empty() {
        errors.push(ValidationError::NoTargets);
    }

    let defaults = TargetDefaults::from(&config.probe);
    for raw in &config.targets {
        if let Err(e) = Target::parse(raw, &defaults) {
            errors.push(e.into());
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Parse the configured targets. Call after [`validate_config`] succeeded.
pub fn parse_targets(config: &MonitorConfig) -> Result<Vec<Target>, TargetError> {
    let defaults = TargetDefaults::from(&config.probe);
    config
        .targets
        .iter()
        .map(|raw| Target::parse(raw, &defaults))
        .collect()
}

//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (period and timeout > 0)
//! - Check that URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function: SupervisorConfig → Result<(), Vec<ValidationError>>

use std::fmt;
use url::Url;

use crate::config::schema::SupervisorConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &SupervisorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.subscription.period_secs == 0 {
        errors.push(ValidationError::new("subscription.period_secs", "must be greater than zero"));
    }

    if let Some(url) = &config.subscription.url {
        if let Err(e) = Url::parse(url) {
            errors.push(ValidationError::new("subscription.url", format!("invalid url {:?}: {}", url, e)));
        }
    }

    if config.health_check.timeout_secs == 0 {
        errors.push(ValidationError::new("health_check.timeout_secs", "must be greater than zero"));
    }

    if let Err(e) = Url::parse(&config.health_check.url) {
        errors.push(ValidationError::new(
            "health_check.url",
            format!("invalid url {:?}: {}", config.health_check.url, e),
        ));
    }

    if config.engine.binary.as_os_str().is_empty() {
        errors.push(ValidationError::new("engine.binary", "must not be empty"));
    }

    if config.engine.config_path.as_os_str().is_empty() {
        errors.push(ValidationError::new("engine.config_path", "must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (window > 0, quota > 0)
//! - Check that header-bound strings are valid header values
//! - Check that enabled features carry their required settings
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderValue;
use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("not a socket address: {}", config.listener.bind_address),
        ));
    }

    if config.session.secret.is_empty() {
        errors.push(ValidationError::new("session.secret", "is required"));
    }
    if config.session.cookie_name.is_empty()
        || !config
            .session
            .cookie_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        errors.push(ValidationError::new(
            "session.cookie_name",
            "must be a non-empty token of [A-Za-z0-9._-]",
        ));
    }
    if config.session.ttl_secs == 0 {
        errors.push(ValidationError::new("session.ttl_secs", "must be > 0"));
    }
    if config.session.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("session.sweep_interval_secs", "must be > 0"));
    }

    for (field, value) in [
        ("cors.allowed_origin", &config.cors.allowed_origin),
        ("cors.allowed_headers", &config.cors.allowed_headers),
        ("cors.allowed_methods", &config.cors.allowed_methods),
        ("security.content_security_policy", &config.security.content_security_policy),
    ] {
        if HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::new(field, "not a valid header value"));
        }
    }
    if config.cors.allowed_origin.is_empty() {
        errors.push(ValidationError::new("cors.allowed_origin", "must not be empty"));
    }

    if config.rate_limit.window_ms == 0 {
        errors.push(ValidationError::new("rate_limit.window_ms", "must be > 0"));
    }
    if config.rate_limit.max == 0 {
        errors.push(ValidationError::new("rate_limit.max", "must be > 0"));
    }

    if config.auth.google_enabled {
        if config.auth.google_client_id.is_empty() {
            errors.push(ValidationError::new("auth.google_client_id", "is required when google is enabled"));
        }
        if config.auth.google_client_secret.is_empty() {
            errors.push(ValidationError::new(
                "auth.google_client_secret",
                "is required when google is enabled",
            ));
        }
        if config.auth.google_callback_url.is_empty() {
            errors.push(ValidationError::new(
                "auth.google_callback_url",
                "is required when google is enabled",
            ));
        }
    }
    if config.auth.provider_timeout_secs == 0 {
        errors.push(ValidationError::new("auth.provider_timeout_secs", "must be > 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "not a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

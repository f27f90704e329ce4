//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding `session.secret`.
pub const ENV_SESSION_SECRET: &str = "GATEWAY_SESSION_SECRET";
/// Environment variable overriding `auth.google_client_id`.
pub const ENV_GOOGLE_CLIENT_ID: &str = "GOOGLE_CLIENT_ID";
/// Environment variable overriding `auth.google_client_secret`.
pub const ENV_GOOGLE_CLIENT_SECRET: &str = "GOOGLE_CLIENT_SECRET";
/// Environment variable overriding `auth.google_callback_url`.
pub const ENV_GOOGLE_CALLBACK_URL: &str = "GOOGLE_CALLBACK_URL";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
///
/// Secrets found in the environment take precedence over the file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: GatewayConfig = toml::from_str(&content)?;
    finalize(config, |key| std::env::var(key).ok())
}

/// Build a configuration from defaults and the environment only.
pub fn load_from_env() -> Result<GatewayConfig, ConfigError> {
    finalize(GatewayConfig::default(), |key| std::env::var(key).ok())
}

fn finalize<F>(mut config: GatewayConfig, env: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    apply_env_overrides(&mut config, env);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay secrets from the environment.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(secret) = env(ENV_SESSION_SECRET) {
        config.session.secret = secret;
    }
    if let Some(id) = env(ENV_GOOGLE_CLIENT_ID) {
        config.auth.google_client_id = id;
        config.auth.google_enabled = true;
    }
    if let Some(secret) = env(ENV_GOOGLE_CLIENT_SECRET) {
        config.auth.google_client_secret = secret;
    }
    if let Some(url) = env(ENV_GOOGLE_CALLBACK_URL) {
        config.auth.google_callback_url = url;
    }
}

//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the API gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Session cookie and store settings.
    pub session: SessionConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// Security headers and body limits.
    pub security: SecurityConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Federated authentication.
    pub auth: AuthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Seconds to wait for in-flight requests on shutdown.
    pub shutdown_grace_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            shutdown_grace_secs: 10,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Secret used to sign the session cookie. Required.
    pub secret: String,

    /// Name of the session cookie.
    pub cookie_name: String,

    /// Mark the cookie `Secure` (HTTPS only).
    pub secure: bool,

    /// Idle lifetime of a session in seconds. Refreshed on every access.
    pub ttl_secs: u64,

    /// Interval between expired-session sweeps in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            cookie_name: "sid".to_string(),
            secure: true,
            ttl_secs: 24 * 60 * 60,
            sweep_interval_secs: 60,
        }
    }
}

/// How `Access-Control-Allow-Origin` is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OriginMode {
    /// Echo the configured origin.
    #[default]
    Specific,
    /// Always `*`.
    Wildcard,
    /// Configured origin first, then overridden by the legacy `*` pass.
    Layered,
}

/// Cross-origin policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Origin allowed to make cross-origin requests.
    pub allowed_origin: String,

    /// Origin header policy.
    pub origin_mode: OriginMode,

    /// Value of `Access-Control-Allow-Headers`.
    pub allowed_headers: String,

    /// Value of `Access-Control-Allow-Methods` on preflight responses.
    pub allowed_methods: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origin: "http://localhost:3000".to_string(),
            origin_mode: OriginMode::Specific,
            allowed_headers: "Origin, X-Requested-With, Content-Type, Accept, Authorization"
                .to_string(),
            allowed_methods: "PUT, POST, DELETE, GET".to_string(),
        }
    }
}

/// `X-Frame-Options` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FrameOption {
    #[default]
    Deny,
    SameOrigin,
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,
    /// `X-Frame-Options` value.
    pub frame_options: FrameOption,
    /// `Content-Security-Policy` value. Empty disables the header.
    pub content_security_policy: String,
    /// HSTS max-age in seconds. Zero disables the header.
    pub hsts_max_age_secs: u64,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            frame_options: FrameOption::Deny,
            content_security_policy: "default-src 'self';base-uri 'self';font-src 'self' https: data:;\
                form-action 'self';frame-ancestors 'self';img-src 'self' data:;object-src 'none';\
                script-src 'self';script-src-attr 'none';style-src 'self' https: 'unsafe-inline';\
                upgrade-insecure-requests"
                .to_string(),
            hsts_max_age_secs: 15_552_000, // 180 days
            max_body_size: 100 * 1024,
        }
    }
}

/// What the rate limiter counts requests against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitKey {
    /// Remote socket address.
    #[default]
    Ip,
    /// Session id, falling back to the remote address.
    Session,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Fixed window length in milliseconds.
    pub window_ms: u64,

    /// Maximum requests per window per client key.
    pub max: u64,

    /// Client key.
    pub key: RateLimitKey,

    /// Message returned in the error envelope on rejection.
    pub message: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: 15 * 60 * 1000,
            max: 100,
            key: RateLimitKey::Ip,
            message: "Too many requests, please try again later.".to_string(),
        }
    }
}

/// Federated authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Register the Google strategy at startup.
    pub google_enabled: bool,

    /// OAuth client id.
    pub google_client_id: String,

    /// OAuth client secret.
    pub google_client_secret: String,

    /// Callback URL registered with the provider.
    pub google_callback_url: String,

    /// Upper bound on a provider round trip, in seconds.
    pub provider_timeout_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            google_enabled: false,
            google_client_id: String::new(),
            google_client_secret: String::new(),
            google_callback_url: "http://localhost:8080/api/auth/google/callback".to_string(),
            provider_timeout_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_policy() {
        let config = GatewayConfig::default();
        assert_eq!(config.rate_limit.window_ms, 900_000);
        assert_eq!(config.rate_limit.max, 100);
        assert_eq!(config.cors.allowed_origin, "http://localhost:3000");
        assert_eq!(config.cors.origin_mode, OriginMode::Specific);
        assert!(config.session.secure);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [session]
            secret = "s3cret"

            [cors]
            origin_mode = "layered"

            [rate_limit]
            max = 5
            key = "session"
            "#,
        )
        .unwrap();

        assert_eq!(config.session.secret, "s3cret");
        assert_eq!(config.session.cookie_name, "sid");
        assert_eq!(config.cors.origin_mode, OriginMode::Layered);
        assert_eq!(config.rate_limit.max, 5);
        assert_eq!(config.rate_limit.key, RateLimitKey::Session);
        assert_eq!(config.rate_limit.window_ms, 900_000);
    }
}

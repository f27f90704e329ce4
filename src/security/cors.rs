//! Cross-origin headers.

use axum::http::{header, HeaderMap, HeaderValue};

use crate::config::{CorsConfig, OriginMode};

const WILDCARD: HeaderValue = HeaderValue::from_static("*");

/// Precomputed CORS headers.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    mode: OriginMode,
    allowed_origin: HeaderValue,
    allowed_headers: HeaderValue,
    allowed_methods: HeaderValue,
}

impl CorsPolicy {
    /// Invalid header values fall back to the restrictive defaults.
    pub fn from_config(config: &CorsConfig) -> Self {
        let defaults = CorsConfig::default();
        let value = |raw: &str, fallback: &str, field: &str| {
            HeaderValue::from_str(raw).unwrap_or_else(|_| {
                tracing::warn!(field, "Invalid CORS header value, using default");
                HeaderValue::from_str(fallback).unwrap_or(WILDCARD)
            })
        };

        Self {
            mode: config.origin_mode,
            allowed_origin: value(&config.allowed_origin, &defaults.allowed_origin, "allowed_origin"),
            allowed_headers: value(&config.allowed_headers, &defaults.allowed_headers, "allowed_headers"),
            allowed_methods: value(&config.allowed_methods, &defaults.allowed_methods, "allowed_methods"),
        }
    }

    /// Headers sent on every response.
    pub fn apply(&self, target: &mut HeaderMap) {
        match self.mode {
            OriginMode::Specific => self.apply_specific(target),
            OriginMode::Wildcard => {
                target.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, WILDCARD);
            }
            OriginMode::Layered => {
                self.apply_specific(target);
                // legacy pass: overrides the specific origin
                target.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, WILDCARD);
            }
        }
        target.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, self.allowed_headers.clone());
    }

    /// Extra headers for a preflight response.
    pub fn apply_preflight(&self, target: &mut HeaderMap) {
        target.insert(header::ACCESS_CONTROL_ALLOW_METHODS, self.allowed_methods.clone());
    }

    fn apply_specific(&self, target: &mut HeaderMap) {
        target.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, self.allowed_origin.clone());
        target.append(header::VARY, HeaderValue::from_static("Origin"));
    }
}

//! Baseline security response headers.
//!
//! # Responsibilities
//! - Build the hardening header set once from configuration
//! - Apply it to every response, preflight and error responses included
//!
//! # Design Decisions
//! - Values are validated into `HeaderValue`s at startup, not per request
//! - Each header can be switched off through configuration

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use crate::config::{FrameOption, SecurityConfig};

/// Precomputed hardening headers.
#[derive(Debug, Clone, Default)]
pub struct SecurityHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl SecurityHeaders {
    pub fn from_config(config: &SecurityConfig) -> Self {
        if !config.enable_headers {
            return Self::default();
        }

        let mut headers = vec![
            (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
            (
                header::X_FRAME_OPTIONS,
                HeaderValue::from_static(match config.frame_options {
                    FrameOption::Deny => "DENY",
                    FrameOption::SameOrigin => "SAMEORIGIN",
                }),
            ),
            (header::REFERRER_POLICY, HeaderValue::from_static("no-referrer")),
            (
                HeaderName::from_static("cross-origin-opener-policy"),
                HeaderValue::from_static("same-origin"),
            ),
            (
                HeaderName::from_static("cross-origin-resource-policy"),
                HeaderValue::from_static("same-origin"),
            ),
            (HeaderName::from_static("origin-agent-cluster"), HeaderValue::from_static("?1")),
            (header::X_DNS_PREFETCH_CONTROL, HeaderValue::from_static("off")),
            (HeaderName::from_static("x-download-options"), HeaderValue::from_static("noopen")),
            (
                HeaderName::from_static("x-permitted-cross-domain-policies"),
                HeaderValue::from_static("none"),
            ),
            (header::X_XSS_PROTECTION, HeaderValue::from_static("0")),
        ];

        if !config.content_security_policy.is_empty() {
            match HeaderValue::from_str(&config.content_security_policy) {
                Ok(value) => headers.push((header::CONTENT_SECURITY_POLICY, value)),
                Err(_) => tracing::warn!("Invalid Content-Security-Policy, header disabled"),
            }
        }

        if config.hsts_max_age_secs > 0 {
            let value = format!("max-age={}; includeSubDomains", config.hsts_max_age_secs);
            if let Ok(value) = HeaderValue::from_str(&value) {
                headers.push((header::STRICT_TRANSPORT_SECURITY, value));
            }
        }

        Self { headers }
    }

    pub fn apply(&self, target: &mut HeaderMap) {
        for (name, value) in &self.headers {
            target.insert(name.clone(), value.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

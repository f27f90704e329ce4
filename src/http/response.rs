//! Terminal responses and the error envelope.
//!
//! # Responsibilities
//! - Define `Failure`, the typed error every route handler returns
//! - Render failures and unmatched routes as `{ "message": ... }`
//! - Map panics caught during dispatch to a 500 failure
//!
//! # Design Decisions
//! - One envelope shape for every terminal failure (404, 429, 5xx, 4xx)
//! - A failure without an explicit status is a 500
//! - Only the failure's message reaches the client, never a backtrace

use std::any::Any;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message of the not-found envelope.
pub const NOT_FOUND_MESSAGE: &str = "Not found";

/// The uniform JSON failure body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub message: String,
}

impl ErrorEnvelope {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Render with the given status.
    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

/// A failure raised while a matched route executes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Failure {
    status: Option<StatusCode>,
    message: String,
}

impl Failure {
    /// A failure with no status; rendered as 500.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// A failure carrying an explicit status.
    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, message)
    }

    /// Status to respond with.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Convert a panic payload caught during dispatch.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Internal server error".to_string()
        };
        Self::new(message)
    }
}

impl From<serde_json::Error> for Failure {
    fn from(e: serde_json::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        failure_response(self)
    }
}

/// Error handler: status from the failure (500 if absent), envelope with its message.
pub fn failure_response(failure: Failure) -> Response {
    let status = failure.status();
    ErrorEnvelope::new(failure.message).into_response_with(status)
}

/// Not-found handler.
pub fn not_found_response() -> Response {
    ErrorEnvelope::new(NOT_FOUND_MESSAGE).into_response_with(StatusCode::NOT_FOUND)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_envelope_is_exact() {
        let response = not_found_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, serde_json::json!({"message": "Not found"}));
    }

    #[tokio::test]
    async fn test_failure_without_status_is_500() {
        let response = failure_response(Failure::new("database exploded"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"message": "database exploded"})
        );
    }

    #[tokio::test]
    async fn test_failure_keeps_explicit_status() {
        let response = Failure::with_status(StatusCode::CONFLICT, "duplicate").into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_panic_payloads() {
        assert_eq!(Failure::from_panic(Box::new("boom")).message(), "boom");
        assert_eq!(
            Failure::from_panic(Box::new(String::from("kaboom"))).message(),
            "kaboom"
        );
        assert_eq!(
            Failure::from_panic(Box::new(42u8)).message(),
            "Internal server error"
        );
    }
}

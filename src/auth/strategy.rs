//! Federated identity strategy contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::response::Failure;

/// An authenticated principal as reported by an identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Strategy that issued the identity, e.g. `google`.
    pub provider: String,

    /// Provider-issued subject id.
    pub subject: String,

    pub display_name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

impl Identity {
    pub fn new(provider: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            subject: subject.into(),
            display_name: None,
            email: None,
            avatar_url: None,
        }
    }
}

/// Where to send the client to start the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub redirect_url: String,

    /// CSRF state; must come back unchanged on the callback.
    pub state: String,
}

/// Query parameters of a provider callback.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Callback {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Authentication failures. Every variant surfaces as 401.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Consent denied: {0}")]
    Denied(String),

    #[error("State mismatch")]
    StateMismatch,

    #[error("Identity provider error: {0}")]
    Provider(String),

    #[error("Identity provider timed out")]
    Timeout,

    #[error("Authenticator not initialized")]
    NotInitialized,

    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),
}

impl From<AuthError> for Failure {
    fn from(err: AuthError) -> Self {
        Failure::unauthorized(err.to_string())
    }
}

/// One federated identity provider.
#[async_trait]
pub trait Strategy: Send + Sync + 'static {
    /// Registration name, used in routes and in `Identity::provider`.
    fn name(&self) -> &'static str;

    /// Build the provider redirect for a new handshake.
    fn challenge(&self) -> Result<Challenge, AuthError>;

    /// Exchange the callback for an identity. `state` has already been checked.
    async fn verify(&self, callback: &Callback) -> Result<Identity, AuthError>;
}

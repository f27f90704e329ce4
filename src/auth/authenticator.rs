//! Strategy registry and the session-backed authentication check.
//!
//! # Responsibilities
//! - Register the configured strategies exactly once at startup
//! - Run the challenge / verify handshake with CSRF state kept in the session
//! - Bound every provider round trip by a timeout
//! - Answer `authenticate` from the identity stored in the session
//!
//! # Design Decisions
//! - Registration is a `OnceLock`: later `initialize` calls change nothing
//! - Every provider problem becomes an `AuthError`, never a panic

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::request::Parts;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::auth::google::GoogleStrategy;
use crate::auth::strategy::{AuthError, Callback, Identity, Strategy};
use crate::config::AuthConfig;
use crate::pipeline::{Flow, PipelineState, RequestContext, RouteContext, Stage};
use crate::session::SessionHandle;

/// Holds the registered strategies.
pub struct Authenticator {
    pending: Mutex<Vec<Arc<dyn Strategy>>>,
    registry: OnceLock<HashMap<&'static str, Arc<dyn Strategy>>>,
    timeout: Duration,
}

impl Authenticator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            registry: OnceLock::new(),
            timeout,
        }
    }

    /// Authenticator with the strategies enabled in `config`.
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let authenticator = Self::new(Duration::from_secs(config.provider_timeout_secs));
        if config.google_enabled {
            authenticator.configure(GoogleStrategy::from_config(config)?);
        }
        Ok(authenticator)
    }

    /// Queue a strategy for registration. Ignored after `initialize`.
    pub fn configure(&self, strategy: impl Strategy) -> &Self {
        if self.is_initialized() {
            warn!(strategy = strategy.name(), "Authenticator already initialized, strategy ignored");
            return self;
        }
        self.pending.lock().push(Arc::new(strategy));
        self
    }

    /// Register the queued strategies. Returns the registration count.
    pub fn initialize(&self) -> usize {
        self.registry
            .get_or_init(|| {
                let registry: HashMap<_, _> = self
                    .pending
                    .lock()
                    .drain(..)
                    .map(|strategy| (strategy.name(), strategy))
                    .collect();
                info!(
                    strategies = ?registry.keys().collect::<Vec<_>>(),
                    "Authentication strategies registered"
                );
                registry
            })
            .len()
    }

    pub fn is_initialized(&self) -> bool {
        self.registry.get().is_some()
    }

    pub fn strategies(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self
            .registry
            .get()
            .map(|registry| registry.keys().copied().collect())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }

    fn strategy(&self, name: &str) -> Result<&Arc<dyn Strategy>, AuthError> {
        self.registry
            .get()
            .ok_or(AuthError::NotInitialized)?
            .get(name)
            .ok_or_else(|| AuthError::UnknownStrategy(name.to_string()))
    }

    /// Start a handshake: remember the CSRF state in the session, return the redirect URL.
    pub fn challenge(&self, name: &str, session: &SessionHandle) -> Result<String, AuthError> {
        let challenge = self.strategy(name)?.challenge()?;
        session.insert(state_key(name), serde_json::Value::String(challenge.state));
        Ok(challenge.redirect_url)
    }

    /// Finish a handshake and store the identity in the session.
    ///
    /// The stored state is consumed whatever the outcome.
    pub async fn verify(
        &self,
        name: &str,
        callback: &Callback,
        session: &SessionHandle,
    ) -> Result<Identity, AuthError> {
        let strategy = self.strategy(name)?;

        let expected = session.remove(&state_key(name));
        let expected = expected.as_ref().and_then(|v| v.as_str());
        if expected.is_none() || expected != callback.state.as_deref() {
            warn!(strategy = name, "OAuth state mismatch");
            return Err(AuthError::StateMismatch);
        }

        let identity = tokio::time::timeout(self.timeout, strategy.verify(callback))
            .await
            .map_err(|_| AuthError::Timeout)??;

        session.set_identity(identity.clone());
        info!(strategy = name, subject = %identity.subject, "User authenticated");
        Ok(identity)
    }

    /// The identity bound to the request's session.
    pub fn authenticate(&self, ctx: &RouteContext) -> Result<Identity, AuthError> {
        ctx.identity()
            .cloned()
            .or_else(|| ctx.session().and_then(SessionHandle::identity))
            .ok_or(AuthError::Unauthenticated)
    }
}

fn state_key(strategy: &str) -> String {
    format!("oauth_state:{strategy}")
}

/// Copies the session's identity into the request context. Never rejects.
pub struct IdentityStage;

#[async_trait]
impl Stage for IdentityStage {
    fn name(&self) -> &'static str {
        "authentication"
    }

    fn reached(&self) -> PipelineState {
        PipelineState::SessionAttached
    }

    async fn process(&self, ctx: &mut RequestContext, _request: &Parts) -> Flow {
        if let Some(identity) = ctx.session().and_then(SessionHandle::identity) {
            ctx.set_identity(identity);
        }
        Flow::Continue
    }
}

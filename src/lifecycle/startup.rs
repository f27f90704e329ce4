//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Build shared state (sessions, counters, strategies) in dependency order
//! - Initialize the authenticator before any request can be served
//! - Compose the pipeline and mount the route groups
//! - Start background sweepers
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Shared state is created here and injected; nothing is global

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::auth::{AuthError, Authenticator, IdentityStage};
use crate::config::{validate_config, ConfigError, GatewayConfig};
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::{LoggingStage, RequestLogger, TracingRequestLogger};
use crate::pipeline::Pipeline;
use crate::routes::{self, TaskBook};
use crate::routing::{Dispatcher, RouteGroup};
use crate::security::{
    key_extractor, CorsPolicy, MemoryRateLimitStore, PolicyStage, RateLimitStage, RateLimiter,
    SecurityHeaders,
};
use crate::session::{SessionError, SessionStage, SessionStore};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Session store: {0}")]
    Session(#[from] SessionError),
    #[error("Authentication: {0}")]
    Auth(#[from] AuthError),
}

/// The assembled gateway: the pipeline plus the shared state behind it.
pub struct Gateway {
    pipeline: Arc<Pipeline>,
    sessions: SessionStore,
    limiter: Option<RateLimiter>,
    authenticator: Arc<Authenticator>,
    config: GatewayConfig,
}

impl Gateway {
    /// Assemble with the default route groups and request logger.
    pub fn assemble(config: &GatewayConfig) -> Result<Self, StartupError> {
        Assembly::new(config).build()
    }

    pub fn pipeline(&self) -> Arc<Pipeline> {
        self.pipeline.clone()
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn limiter(&self) -> Option<&RateLimiter> {
        self.limiter.as_ref()
    }

    pub fn authenticator(&self) -> &Arc<Authenticator> {
        &self.authenticator
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Start the session and rate-limit sweepers. They stop on shutdown.
    pub fn spawn_background(&self, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        let mut tasks = vec![self.sessions.spawn_sweeper(
            Duration::from_secs(self.config.session.sweep_interval_secs),
            shutdown.subscribe(),
        )];
        if let Some(limiter) = &self.limiter {
            tasks.push(limiter.spawn_sweeper(shutdown.subscribe()));
        }
        tasks
    }
}

/// Customizable gateway assembly.
pub struct Assembly<'a> {
    config: &'a GatewayConfig,
    extra_routes: Vec<RouteGroup>,
    logger: Arc<dyn RequestLogger>,
}

impl<'a> Assembly<'a> {
    pub fn new(config: &'a GatewayConfig) -> Self {
        Self {
            config,
            extra_routes: Vec::new(),
            logger: Arc::new(TracingRequestLogger),
        }
    }

    /// Mount an additional route group after the built-in ones.
    #[must_use]
    pub fn mount(mut self, group: RouteGroup) -> Self {
        self.extra_routes.push(group);
        self
    }

    #[must_use]
    pub fn logger(mut self, logger: Arc<dyn RequestLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn build(self) -> Result<Gateway, StartupError> {
        let config = self.config;
        validate_config(config).map_err(ConfigError::Validation)?;

        let sessions = SessionStore::in_memory(&config.session)?;

        let authenticator = Arc::new(Authenticator::from_config(&config.auth)?);
        authenticator.initialize();

        let limiter = config.rate_limit.enabled.then(|| {
            RateLimiter::from_config(&config.rate_limit, Arc::new(MemoryRateLimitStore::new()))
        });

        let mut dispatcher = Dispatcher::new()
            .mount(routes::auth::group(authenticator.clone(), sessions.clone()))
            .mount(routes::tasks::group(
                Arc::new(TaskBook::new()),
                authenticator.clone(),
            ));
        for group in self.extra_routes {
            dispatcher = dispatcher.mount(group);
        }

        let mut builder = Pipeline::builder()
            .session(SessionStage::new(sessions.clone()))
            .authentication(IdentityStage)
            .policy(PolicyStage::new(
                CorsPolicy::from_config(&config.cors),
                SecurityHeaders::from_config(&config.security),
            ))
            .logging(LoggingStage::new(self.logger))
            .dispatcher(dispatcher);
        if let Some(limiter) = &limiter {
            builder = builder.rate_limit(RateLimitStage::new(
                limiter.clone(),
                key_extractor(config.rate_limit.key),
                config.rate_limit.message.clone(),
            ));
        }
        let pipeline = builder.build();

        tracing::info!(
            stages = ?pipeline.stage_names(),
            routes = ?pipeline.dispatcher().prefixes(),
            strategies = ?authenticator.strategies(),
            "Gateway assembled"
        );

        Ok(Gateway {
            pipeline: Arc::new(pipeline),
            sessions,
            limiter,
            authenticator,
            config: config.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;

    fn config() -> GatewayConfig {
        GatewayConfig {
            session: SessionConfig {
                secret: "startup-secret".into(),
                ..SessionConfig::default()
            },
            ..GatewayConfig::default()
        }
    }

    #[test]
    fn test_assembles_in_fixed_order() {
        let gateway = Gateway::assemble(&config()).unwrap();
        assert_eq!(
            gateway.pipeline().stage_names(),
            vec!["session", "authentication", "policy", "rate_limit", "logging"]
        );
        assert_eq!(
            gateway.pipeline().dispatcher().prefixes(),
            vec!["/api/auth", "/api/tasks"]
        );
        assert!(gateway.authenticator().is_initialized());
    }

    #[test]
    fn test_rate_limit_can_be_disabled() {
        let mut config = config();
        config.rate_limit.enabled = false;
        let gateway = Gateway::assemble(&config).unwrap();
        assert!(gateway.limiter().is_none());
        assert!(!gateway.pipeline().stage_names().contains(&"rate_limit"));
    }

    #[test]
    fn test_missing_secret_fails_fast() {
        let err = Gateway::assemble(&GatewayConfig::default()).err().unwrap();
        assert!(matches!(err, StartupError::Config(ConfigError::Validation(_))));
    }

    #[tokio::test]
    async fn test_background_tasks_stop_on_shutdown() {
        let gateway = Gateway::assemble(&config()).unwrap();
        let shutdown = Shutdown::new();
        let tasks = gateway.spawn_background(&shutdown);
        assert_eq!(tasks.len(), 2);

        shutdown.trigger();
        for task in tasks {
            task.await.unwrap();
        }
    }
}

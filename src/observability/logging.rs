//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Log each admitted request once, after the rate check
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level
//! - The request logger is a collaborator trait so callers can swap the sink

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::request::Parts;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::pipeline::{Flow, PipelineState, RequestContext, Stage};

/// Install the global subscriber. Safe to call more than once; later calls are no-ops.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("api_gateway={level},tower_http={level}")));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Request log sink.
pub trait RequestLogger: Send + Sync + 'static {
    fn log(&self, ctx: &RequestContext, request: &Parts);
}

/// Default logger: one `info` event per request.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRequestLogger;

impl RequestLogger for TracingRequestLogger {
    fn log(&self, ctx: &RequestContext, request: &Parts) {
        let client = ctx
            .client_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| "-".to_string());

        tracing::info!(
            request_id = %ctx.request_id(),
            method = %request.method,
            path = %request.uri.path(),
            client = %client,
            authenticated = ctx.identity().is_some(),
            "API request"
        );
    }
}

/// Runs the request logger. Never rejects.
pub struct LoggingStage {
    logger: Arc<dyn RequestLogger>,
}

impl LoggingStage {
    pub fn new(logger: Arc<dyn RequestLogger>) -> Self {
        Self { logger }
    }
}

impl Default for LoggingStage {
    fn default() -> Self {
        Self::new(Arc::new(TracingRequestLogger))
    }
}

#[async_trait]
impl Stage for LoggingStage {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn reached(&self) -> PipelineState {
        PipelineState::Logged
    }

    async fn process(&self, ctx: &mut RequestContext, request: &Parts) -> Flow {
        self.logger.log(ctx, request);
        Flow::Continue
    }
}

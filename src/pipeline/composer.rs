//! Fixed-order pipeline composition.
//!
//! Stages always run in this order, whatever order the builder was called in:
//!
//! 1. **Session** - attach or create the session
//! 2. **Authentication** - load the session's identity (no enforcement)
//! 3. **Policy** - CORS, security headers, preflight short-circuit
//! 4. **Rate limit** - fixed-window quota per client key
//! 5. **Logging** - request logger collaborator
//!
//! then the dispatcher, then the error or not-found handler.

use std::sync::Arc;

use axum::{body::Body, http::Request, response::Response};

use crate::http::response::{failure_response, not_found_response};
use crate::observability::metrics;
use crate::pipeline::context::{PipelineState, RequestContext};
use crate::pipeline::stage::{Flow, Stage};
use crate::routing::{Dispatch, Dispatcher};

/// A type-erased stage.
pub type BoxedStage = Arc<dyn Stage>;

/// The composed request pipeline.
pub struct Pipeline {
    stages: Vec<BoxedStage>,
    dispatcher: Dispatcher,
}

impl Pipeline {
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Run one request through every stage and produce exactly one response.
    pub async fn handle(&self, mut ctx: RequestContext, request: Request<Body>) -> Response {
        let (parts, body) = request.into_parts();

        let mut ran = 0;
        let mut short_circuit = None;
        for stage in &self.stages {
            ran += 1;
            match stage.process(&mut ctx, &parts).await {
                Flow::Continue => ctx.advance(stage.reached()),
                Flow::Respond(response) => {
                    tracing::debug!(
                        request_id = %ctx.request_id(),
                        stage = stage.name(),
                        status = %response.status(),
                        "Pipeline short-circuited"
                    );
                    ctx.advance(PipelineState::Completed);
                    short_circuit = Some(response);
                    break;
                }
            }
        }

        let mut response = match short_circuit {
            Some(response) => response,
            None => self.dispatch(&mut ctx, Request::from_parts(parts, body)).await,
        };

        for stage in self.stages[..ran].iter().rev() {
            stage.finish(&ctx, &mut response);
        }
        response.headers_mut().extend(ctx.take_response_headers());

        metrics::record_request(ctx.state().as_str(), response.status().as_u16(), ctx.elapsed());
        response
    }

    async fn dispatch(&self, ctx: &mut RequestContext, request: Request<Body>) -> Response {
        ctx.advance(PipelineState::Dispatched);

        match self.dispatcher.dispatch(ctx, request).await {
            Dispatch::Handled(Ok(response)) => {
                ctx.advance(PipelineState::Completed);
                response
            }
            Dispatch::Handled(Err(failure)) => {
                ctx.advance(PipelineState::Errored);
                tracing::error!(
                    request_id = %ctx.request_id(),
                    status = %failure.status(),
                    error = %failure,
                    "Route handler failed"
                );
                failure_response(failure)
            }
            Dispatch::NoMatch => {
                ctx.advance(PipelineState::NotFound);
                not_found_response()
            }
        }
    }

    /// Names of all stages in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

/// Builder for a [`Pipeline`]. Each slot is optional; the order is not.
#[derive(Default)]
pub struct PipelineBuilder {
    session: Option<BoxedStage>,
    authentication: Option<BoxedStage>,
    policy: Option<BoxedStage>,
    rate_limit: Option<BoxedStage>,
    logging: Option<BoxedStage>,
    dispatcher: Dispatcher,
}

impl PipelineBuilder {
    #[must_use]
    pub fn session(mut self, stage: impl Stage) -> Self {
        self.session = Some(Arc::new(stage));
        self
    }

    #[must_use]
    pub fn authentication(mut self, stage: impl Stage) -> Self {
        self.authentication = Some(Arc::new(stage));
        self
    }

    #[must_use]
    pub fn policy(mut self, stage: impl Stage) -> Self {
        self.policy = Some(Arc::new(stage));
        self
    }

    #[must_use]
    pub fn rate_limit(mut self, stage: impl Stage) -> Self {
        self.rate_limit = Some(Arc::new(stage));
        self
    }

    #[must_use]
    pub fn logging(mut self, stage: impl Stage) -> Self {
        self.logging = Some(Arc::new(stage));
        self
    }

    #[must_use]
    pub fn dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    #[must_use]
    pub fn build(self) -> Pipeline {
        let stages = [
            self.session,
            self.authentication,
            self.policy,
            self.rate_limit,
            self.logging,
        ]
        .into_iter()
        .flatten()
        .collect();

        Pipeline {
            stages,
            dispatcher: self.dispatcher,
        }
    }
}

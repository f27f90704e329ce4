//! The stage contract.

use async_trait::async_trait;
use axum::{http::request::Parts, response::Response};

use crate::pipeline::context::{PipelineState, RequestContext};

/// Outcome of a stage.
#[derive(Debug)]
pub enum Flow {
    /// Hand the request to the next stage.
    Continue,
    /// End the request with this response; later stages do not run.
    Respond(Response),
}

/// One unit of request processing.
///
/// Stages see the request head only; the body is left untouched for the
/// route handler.
#[async_trait]
pub trait Stage: Send + Sync + 'static {
    /// Name used in logs and `Pipeline::stage_names`.
    fn name(&self) -> &'static str;

    /// State the request reaches when this stage returns `Flow::Continue`.
    fn reached(&self) -> PipelineState;

    async fn process(&self, ctx: &mut RequestContext, request: &Parts) -> Flow;

    /// Called on the final response, in reverse stage order, for every stage
    /// whose `process` ran.
    fn finish(&self, _ctx: &RequestContext, _response: &mut Response) {}
}

//! Perimeter policy stage: CORS, security headers and preflight.

use async_trait::async_trait;
use axum::{
    http::{request::Parts, Method, StatusCode},
    response::IntoResponse,
    Json,
};

use crate::pipeline::{Flow, PipelineState, RequestContext, Stage};
use crate::security::cors::CorsPolicy;
use crate::security::headers::SecurityHeaders;

/// Applies perimeter headers to every response and answers preflight requests.
///
/// Preflight (`OPTIONS`, any path) ends here with 200 and `{}`, before rate
/// limiting and dispatch.
pub struct PolicyStage {
    cors: CorsPolicy,
    security: SecurityHeaders,
}

impl PolicyStage {
    pub fn new(cors: CorsPolicy, security: SecurityHeaders) -> Self {
        Self { cors, security }
    }
}

#[async_trait]
impl Stage for PolicyStage {
    fn name(&self) -> &'static str {
        "policy"
    }

    fn reached(&self) -> PipelineState {
        PipelineState::PolicyChecked
    }

    async fn process(&self, ctx: &mut RequestContext, request: &Parts) -> Flow {
        let headers = ctx.response_headers_mut();
        self.security.apply(headers);
        self.cors.apply(headers);

        if request.method == Method::OPTIONS {
            self.cors.apply_preflight(headers);
            ctx.mark_preflight();
            return Flow::Respond((StatusCode::OK, Json(serde_json::json!({}))).into_response());
        }

        Flow::Continue
    }
}

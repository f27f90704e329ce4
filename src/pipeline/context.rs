//! Per-request context threaded through every stage.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::http::HeaderMap;
use tokio::time::{Duration, Instant};

use crate::auth::Identity;
use crate::session::SessionHandle;

/// Position of a request in the pipeline.
///
/// Ordered: a request only ever moves forward. `Completed`, `Errored` and
/// `NotFound` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipelineState {
    Entered,
    SessionAttached,
    PolicyChecked,
    RateChecked,
    Logged,
    Dispatched,
    Completed,
    Errored,
    NotFound,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Errored | Self::NotFound)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Entered => "entered",
            Self::SessionAttached => "session_attached",
            Self::PolicyChecked => "policy_checked",
            Self::RateChecked => "rate_checked",
            Self::Logged => "logged",
            Self::Dispatched => "dispatched",
            Self::Completed => "completed",
            Self::Errored => "errored",
            Self::NotFound => "not_found",
        }
    }
}

/// Mutable state for one request's traversal.
///
/// Stages populate `session` and `identity` progressively and queue headers
/// that the composer merges into whichever response ends the request.
#[derive(Debug)]
pub struct RequestContext {
    request_id: String,
    client_addr: Option<SocketAddr>,
    state: PipelineState,
    session: Option<SessionHandle>,
    identity: Option<Identity>,
    response_headers: HeaderMap,
    preflight: bool,
    started_at: Instant,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>, client_addr: Option<SocketAddr>) -> Self {
        Self {
            request_id: request_id.into(),
            client_addr,
            state: PipelineState::Entered,
            session: None,
            identity: None,
            response_headers: HeaderMap::new(),
            preflight: false,
            started_at: Instant::now(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn client_addr(&self) -> Option<SocketAddr> {
        self.client_addr
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Move to `next`. Backward moves and moves out of a terminal state are ignored.
    pub fn advance(&mut self, next: PipelineState) {
        if self.state.is_terminal() || next < self.state {
            tracing::warn!(
                request_id = %self.request_id,
                from = self.state.as_str(),
                to = next.as_str(),
                "Ignored out-of-order pipeline transition"
            );
            return;
        }
        self.state = next;
    }

    /// Attach the session. Returns `false` (and keeps the first) if one is already attached.
    pub fn attach_session(&mut self, session: SessionHandle) -> bool {
        if self.session.is_some() {
            return false;
        }
        self.session = Some(session);
        true
    }

    pub fn session(&self) -> Option<&SessionHandle> {
        self.session.as_ref()
    }

    pub fn set_identity(&mut self, identity: Identity) {
        self.identity = Some(identity);
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Headers merged into the final response.
    pub fn response_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.response_headers
    }

    pub fn take_response_headers(&mut self) -> HeaderMap {
        std::mem::take(&mut self.response_headers)
    }

    pub fn mark_preflight(&mut self) {
        self.preflight = true;
    }

    pub fn is_preflight(&self) -> bool {
        self.preflight
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Snapshot handed to a route handler.
    pub fn route_context(&self, params: HashMap<String, String>) -> RouteContext {
        RouteContext {
            request_id: self.request_id.clone(),
            client_addr: self.client_addr,
            session: self.session.clone(),
            identity: self.identity.clone(),
            params,
        }
    }
}

/// What a route handler sees of the pipeline.
#[derive(Debug, Clone)]
pub struct RouteContext {
    request_id: String,
    client_addr: Option<SocketAddr>,
    session: Option<SessionHandle>,
    identity: Option<Identity>,
    params: HashMap<String, String>,
}

impl RouteContext {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn client_addr(&self) -> Option<SocketAddr> {
        self.client_addr
    }

    pub fn session(&self) -> Option<&SessionHandle> {
        self.session.as_ref()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Value of a `:name` path segment.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states_only_move_forward() {
        let mut ctx = RequestContext::new("req-1", None);
        ctx.advance(PipelineState::PolicyChecked);
        ctx.advance(PipelineState::SessionAttached);
        assert_eq!(ctx.state(), PipelineState::PolicyChecked);

        ctx.advance(PipelineState::Completed);
        ctx.advance(PipelineState::NotFound);
        assert_eq!(ctx.state(), PipelineState::Completed);
    }

    #[test]
    fn test_session_attaches_once() {
        let mut ctx = RequestContext::new("req-2", None);
        let first = SessionHandle::fresh();
        let second = SessionHandle::fresh();

        assert!(ctx.attach_session(first.clone()));
        assert!(!ctx.attach_session(second));
        assert_eq!(ctx.session().unwrap().id(), first.id());
    }

    #[test]
    fn test_route_context_shares_session_instance() {
        let mut ctx = RequestContext::new("req-3", None);
        ctx.attach_session(SessionHandle::fresh());

        let route = ctx.route_context(HashMap::from([("id".to_string(), "7".to_string())]));
        route.session().unwrap().insert("k", serde_json::json!(1));

        assert_eq!(ctx.session().unwrap().get("k"), Some(serde_json::json!(1)));
        assert_eq!(route.param("id"), Some("7"));
    }
}

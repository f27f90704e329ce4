//! Session attach stage.

use async_trait::async_trait;
use axum::{http::request::Parts, response::Response};

use crate::pipeline::{Flow, PipelineState, RequestContext, Stage};
use crate::session::store::SessionStore;

/// First pipeline stage: attaches the session, commits it on the way out.
///
/// New sessions are not persisted for preflight responses.
pub struct SessionStage {
    store: SessionStore,
}

impl SessionStage {
    pub fn new(store: SessionStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Stage for SessionStage {
    fn name(&self) -> &'static str {
        "session"
    }

    fn reached(&self) -> PipelineState {
        PipelineState::SessionAttached
    }

    async fn process(&self, ctx: &mut RequestContext, request: &Parts) -> Flow {
        if ctx.session().is_none() {
            ctx.attach_session(self.store.attach(&request.headers));
        }
        Flow::Continue
    }

    fn finish(&self, ctx: &RequestContext, response: &mut Response) {
        let Some(session) = ctx.session() else {
            return;
        };
        if ctx.is_preflight() && session.is_new() {
            return;
        }
        self.store.commit(session, response);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use axum::http::{header::SET_COOKIE, Request};

    fn stage() -> (SessionStage, SessionStore) {
        let config = SessionConfig {
            secret: "stage-secret".into(),
            ..SessionConfig::default()
        };
        let store = SessionStore::in_memory(&config).unwrap();
        (SessionStage::new(store.clone()), store)
    }

    fn parts() -> Parts {
        Request::builder().uri("/").body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_new_session_committed_on_finish() {
        let (stage, store) = stage();
        let mut ctx = RequestContext::new("r", None);

        assert!(matches!(stage.process(&mut ctx, &parts()).await, Flow::Continue));
        let mut response = Response::default();
        stage.finish(&ctx, &mut response);

        assert!(response.headers().contains_key(SET_COOKIE));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_preflight_does_not_persist_new_session() {
        let (stage, store) = stage();
        let mut ctx = RequestContext::new("r", None);
        stage.process(&mut ctx, &parts()).await;
        ctx.mark_preflight();

        let mut response = Response::default();
        stage.finish(&ctx, &mut response);

        assert!(!response.headers().contains_key(SET_COOKIE));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_process_keeps_one_session() {
        let (stage, _store) = stage();
        let mut ctx = RequestContext::new("r", None);
        stage.process(&mut ctx, &parts()).await;
        let first = ctx.session().unwrap().id();
        stage.process(&mut ctx, &parts()).await;
        assert_eq!(ctx.session().unwrap().id(), first);
    }
}

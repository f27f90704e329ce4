//! `/api/auth` route group.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::Query,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::auth::{AuthError, Authenticator, Callback, GoogleStrategy};
use crate::http::response::Failure;
use crate::pipeline::RouteContext;
use crate::routing::RouteGroup;
use crate::session::{SessionHandle, SessionStore};

pub const PREFIX: &str = "/api/auth";

/// Handshake, current-user and logout routes.
pub fn group(authenticator: Arc<Authenticator>, sessions: SessionStore) -> RouteGroup {
    let start = authenticator.clone();
    let callback = authenticator.clone();
    let me = authenticator;

    RouteGroup::new(PREFIX)
        .get("/google", move |ctx, _req| {
            let authenticator = start.clone();
            async move {
                let url = authenticator.challenge(GoogleStrategy::NAME, session_of(&ctx)?)?;
                Ok::<_, Failure>((StatusCode::FOUND, [(header::LOCATION, url)]).into_response())
            }
        })
        .get("/google/callback", move |ctx, req| {
            let authenticator = callback.clone();
            async move { complete(&authenticator, &ctx, req).await }
        })
        .get("/me", move |ctx, _req| {
            let authenticator = me.clone();
            async move {
                let identity = authenticator.authenticate(&ctx)?;
                Ok::<_, Failure>(Json(identity).into_response())
            }
        })
        .post("/logout", move |ctx, _req| {
            let sessions = sessions.clone();
            async move {
                sessions.destroy(session_of(&ctx)?);
                Ok::<_, Failure>(Json(json!({ "message": "Logged out" })).into_response())
            }
        })
}

async fn complete(
    authenticator: &Authenticator,
    ctx: &RouteContext,
    request: Request<Body>,
) -> Result<Response, Failure> {
    let Query(callback) = Query::<Callback>::try_from_uri(request.uri())
        .map_err(|_| Failure::from(AuthError::Unauthenticated))?;

    let identity = authenticator
        .verify(GoogleStrategy::NAME, &callback, session_of(ctx)?)
        .await
        .map_err(|err| {
            tracing::warn!(request_id = %ctx.request_id(), error = %err, "Authentication failed");
            Failure::from(err)
        })?;

    Ok(Json(identity).into_response())
}

fn session_of(ctx: &RouteContext) -> Result<&SessionHandle, Failure> {
    ctx.session()
        .ok_or_else(|| Failure::new("Session unavailable"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Challenge, Identity, Strategy};
    use crate::config::SessionConfig;
    use crate::pipeline::RequestContext;
    use crate::routing::{Dispatch, Dispatcher};
    use async_trait::async_trait;
    use http_body_util::BodyExt;
    use std::time::Duration;

    struct FakeGoogle;

    #[async_trait]
    impl Strategy for FakeGoogle {
        fn name(&self) -> &'static str {
            GoogleStrategy::NAME
        }

        fn challenge(&self) -> Result<Challenge, AuthError> {
            Ok(Challenge {
                redirect_url: "https://accounts.example/auth?state=s1".into(),
                state: "s1".into(),
            })
        }

        async fn verify(&self, _callback: &Callback) -> Result<Identity, AuthError> {
            Ok(Identity::new("google", "g-1"))
        }
    }

    fn dispatcher() -> (Dispatcher, SessionStore) {
        let authenticator = Authenticator::new(Duration::from_secs(1));
        authenticator.configure(FakeGoogle);
        authenticator.initialize();

        let sessions = SessionStore::in_memory(&SessionConfig {
            secret: "test-secret".into(),
            ..SessionConfig::default()
        })
        .unwrap();
        let dispatcher = Dispatcher::new().mount(group(Arc::new(authenticator), sessions.clone()));
        (dispatcher, sessions)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn run(dispatcher: &Dispatcher, ctx: &RequestContext, req: Request<Body>) -> Response {
        match dispatcher.dispatch(ctx, req).await {
            Dispatch::Handled(Ok(response)) => response,
            Dispatch::Handled(Err(failure)) => failure.into_response(),
            Dispatch::NoMatch => panic!("route not mounted"),
        }
    }

    #[tokio::test]
    async fn test_full_handshake() {
        let (dispatcher, _) = dispatcher();
        let session = SessionHandle::fresh();
        let mut ctx = RequestContext::new("r", None);
        ctx.attach_session(session.clone());

        let response = run(&dispatcher, &ctx, get("/api/auth/google")).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://accounts.example/auth?state=s1"
        );

        let response = run(
            &dispatcher,
            &ctx,
            get("/api/auth/google/callback?code=abc&state=s1"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let identity: Identity = serde_json::from_slice(&body).unwrap();
        assert_eq!(identity.subject, "g-1");
        assert_eq!(session.identity(), Some(identity));
    }

    #[tokio::test]
    async fn test_callback_with_wrong_state_is_401() {
        let (dispatcher, _) = dispatcher();
        let mut ctx = RequestContext::new("r", None);
        ctx.attach_session(SessionHandle::fresh());

        run(&dispatcher, &ctx, get("/api/auth/google")).await;
        let response = run(
            &dispatcher,
            &ctx,
            get("/api/auth/google/callback?code=abc&state=nope"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_me_requires_identity() {
        let (dispatcher, _) = dispatcher();
        let mut ctx = RequestContext::new("r", None);
        ctx.attach_session(SessionHandle::fresh());

        let response = run(&dispatcher, &ctx, get("/api/auth/me")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_destroys_session() {
        let (dispatcher, _) = dispatcher();
        let session = SessionHandle::fresh();
        session.set_identity(Identity::new("google", "g-1"));
        let mut ctx = RequestContext::new("r", None);
        ctx.attach_session(session.clone());

        let request = Request::builder()
            .method("POST")
            .uri("/api/auth/logout")
            .body(Body::empty())
            .unwrap();
        let response = run(&dispatcher, &ctx, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(session.is_destroyed());
    }
}

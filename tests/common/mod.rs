//! Shared utilities for the integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use api_gateway::config::{GatewayConfig, SessionConfig};
use api_gateway::lifecycle::Assembly;
use api_gateway::observability::RequestLogger;
use api_gateway::pipeline::RequestContext;
use api_gateway::routing::RouteGroup;
use api_gateway::HttpServer;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{request::Parts, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use tower::ServiceExt;

pub const CLIENT_A: &str = "203.0.113.10:40000";
pub const CLIENT_B: &str = "203.0.113.20:40000";

/// Defaults plus the one required secret.
pub fn test_config() -> GatewayConfig {
    GatewayConfig {
        session: SessionConfig {
            secret: "integration-test-secret".into(),
            ..SessionConfig::default()
        },
        ..GatewayConfig::default()
    }
}

/// Counts request-logger invocations.
#[derive(Default)]
pub struct CountingLogger(AtomicUsize);

impl CountingLogger {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl RequestLogger for CountingLogger {
    fn log(&self, _ctx: &RequestContext, _request: &Parts) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Build the full layered app, with extra route groups mounted after the built-in ones.
pub fn app_with(
    config: &GatewayConfig,
    extra: Vec<RouteGroup>,
    logger: Option<Arc<dyn RequestLogger>>,
) -> Router {
    let mut assembly = Assembly::new(config);
    for group in extra {
        assembly = assembly.mount(group);
    }
    if let Some(logger) = logger {
        assembly = assembly.logger(logger);
    }
    let gateway = assembly.build().unwrap();
    HttpServer::new(config.clone(), gateway.pipeline()).router()
}

pub fn app() -> Router {
    app_with(&test_config(), Vec::new(), None)
}

/// A request as if it arrived from `client`.
pub fn request(method: Method, uri: &str, client: &str) -> Request<Body> {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let addr: SocketAddr = client.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

/// A JSON request as if it arrived from `client`.
pub fn json_request(method: Method, uri: &str, client: &str, body: &str) -> Request<Body> {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let addr: SocketAddr = client.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    TestResponse {
        status,
        headers,
        body,
    }
}

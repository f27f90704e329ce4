//! Route groups and dispatch.
//!
//! # Responsibilities
//! - Store route groups mounted under a path prefix
//! - Find the handler for a request (prefix, then method + pattern)
//! - Run it, turning panics into failures
//! - Report an explicit no-match so the pipeline can answer 404
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - First mounted group whose prefix matches and has a route wins
//! - O(n) scan (acceptable for typical route counts)

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    response::Response,
};
use futures_util::FutureExt;

use crate::http::response::Failure;
use crate::pipeline::context::{RequestContext, RouteContext};
use crate::routing::matcher::{PathPattern, PathPrefixMatcher};

/// A route handler.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn call(&self, ctx: RouteContext, request: Request<Body>) -> Result<Response, Failure>;
}

/// Adapts an async function into a [`Handler`].
pub struct FnHandler<F> {
    func: F,
}

impl<F> FnHandler<F> {
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(RouteContext, Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, Failure>> + Send + 'static,
{
    async fn call(&self, ctx: RouteContext, request: Request<Body>) -> Result<Response, Failure> {
        (self.func)(ctx, request).await
    }
}

/// Result of dispatching a request.
#[derive(Debug)]
pub enum Dispatch {
    /// A route matched and its handler ran.
    Handled(Result<Response, Failure>),
    /// No group or route matched.
    NoMatch,
}

struct Route {
    method: Method,
    pattern: PathPattern,
    handler: Arc<dyn Handler>,
}

/// Handlers mounted under a common prefix.
pub struct RouteGroup {
    prefix: PathPrefixMatcher,
    routes: Vec<Route>,
}

impl RouteGroup {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: PathPrefixMatcher::new(prefix),
            routes: Vec::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        self.prefix.prefix()
    }

    /// Register a handler object.
    #[must_use]
    pub fn handler(mut self, method: Method, pattern: &str, handler: Arc<dyn Handler>) -> Self {
        self.routes.push(Route {
            method,
            pattern: PathPattern::new(pattern),
            handler,
        });
        self
    }

    /// Register an async function.
    #[must_use]
    pub fn route<F, Fut>(self, method: Method, pattern: &str, func: F) -> Self
    where
        F: Fn(RouteContext, Request<Body>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, Failure>> + Send + 'static,
    {
        self.handler(method, pattern, Arc::new(FnHandler::new(func)))
    }

    #[must_use]
    pub fn get<F, Fut>(self, pattern: &str, func: F) -> Self
    where
        F: Fn(RouteContext, Request<Body>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, Failure>> + Send + 'static,
    {
        self.route(Method::GET, pattern, func)
    }

    #[must_use]
    pub fn post<F, Fut>(self, pattern: &str, func: F) -> Self
    where
        F: Fn(RouteContext, Request<Body>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, Failure>> + Send + 'static,
    {
        self.route(Method::POST, pattern, func)
    }

    #[must_use]
    pub fn put<F, Fut>(self, pattern: &str, func: F) -> Self
    where
        F: Fn(RouteContext, Request<Body>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, Failure>> + Send + 'static,
    {
        self.route(Method::PUT, pattern, func)
    }

    #[must_use]
    pub fn delete<F, Fut>(self, pattern: &str, func: F) -> Self
    where
        F: Fn(RouteContext, Request<Body>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, Failure>> + Send + 'static,
    {
        self.route(Method::DELETE, pattern, func)
    }

    /// `HEAD` falls back to the `GET` route when no `HEAD` route is registered.
    fn find(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(Arc<dyn Handler>, std::collections::HashMap<String, String>)> {
        let rest = self.prefix.strip(path)?;
        let lookup = |wanted: &Method| {
            self.routes.iter().find_map(|route| {
                if route.method != *wanted {
                    return None;
                }
                route
                    .pattern
                    .matches(rest)
                    .map(|params| (route.handler.clone(), params))
            })
        };
        lookup(method).or_else(|| {
            if *method == Method::HEAD {
                lookup(&Method::GET)
            } else {
                None
            }
        })
    }
}

/// Forwards requests to mounted route groups.
#[derive(Default)]
pub struct Dispatcher {
    groups: Vec<RouteGroup>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount a route group.
    #[must_use]
    pub fn mount(mut self, group: RouteGroup) -> Self {
        tracing::debug!(prefix = group.prefix(), routes = group.routes.len(), "Route group mounted");
        self.groups.push(group);
        self
    }

    /// Prefixes of mounted groups in mount order.
    pub fn prefixes(&self) -> Vec<&str> {
        self.groups.iter().map(RouteGroup::prefix).collect()
    }

    /// Run the matching handler, if any.
    pub async fn dispatch(&self, ctx: &RequestContext, request: Request<Body>) -> Dispatch {
        let path = request.uri().path();
        let found = self
            .groups
            .iter()
            .find_map(|group| group.find(request.method(), path));

        let Some((handler, params)) = found else {
            tracing::debug!(
                request_id = %ctx.request_id(),
                method = %request.method(),
                path = %path,
                "No route matched"
            );
            return Dispatch::NoMatch;
        };

        let route_ctx = ctx.route_context(params);
        match AssertUnwindSafe(handler.call(route_ctx, request))
            .catch_unwind()
            .await
        {
            Ok(result) => Dispatch::Handled(result),
            Err(panic) => {
                tracing::error!(request_id = %ctx.request_id(), "Route handler panicked");
                Dispatch::Handled(Err(Failure::from_panic(panic)))
            }
        }
    }
}

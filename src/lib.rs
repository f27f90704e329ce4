//! API gateway library.
//!
//! Every request runs through one fixed pipeline:
//!
//! ```text
//! session → authentication → policy (CORS, security headers, preflight)
//!     → rate limit → request log → dispatcher → error / not-found handler
//! ```
//!
//! Route groups `/api/auth` and `/api/tasks` sit behind the pipeline.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod pipeline;
pub mod routing;

// Request-scoped state and identity
pub mod auth;
pub mod session;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

pub mod routes;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::{Gateway, Shutdown};
pub use pipeline::Pipeline;

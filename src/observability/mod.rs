//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every request:
//!     → TraceLayer span (method, uri, x-request-id)
//!     → logging.rs LoggingStage (one event per admitted request)
//!     → metrics.rs record_request (terminal state, status, latency)
//!
//! Rate-limit rejections:
//!     → warn event + gateway_rate_limited_total
//! ```
//!
//! # Design Decisions
//! - Request ID flows through logs and back to the client
//! - The Prometheus exporter is opt-in

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LoggingStage, RequestLogger, TracingRequestLogger};

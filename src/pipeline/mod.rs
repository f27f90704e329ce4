//! Request pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! Request
//!     → session      (Entered → SessionAttached)
//!     → identity     (SessionAttached)
//!     → policy       (→ PolicyChecked, or Completed on preflight)
//!     → rate limit   (→ RateChecked, or Completed on 429)
//!     → logging      (→ Logged)
//!     → dispatcher   (→ Dispatched)
//!         → handler Ok     → Completed
//!         → handler Err    → Errored  (error envelope)
//!         → no route       → NotFound (404 envelope)
//!     → finish hooks in reverse, queued headers merged
//!     → exactly one response
//! ```
//!
//! # Design Decisions
//! - Stages are an explicit ordered list returning `Continue | Respond`
//! - Per-request data lives in `RequestContext`, never on the request
//! - Shared state (sessions, counters) is injected into stages at build time

pub mod composer;
pub mod context;
pub mod stage;

pub use composer::{Pipeline, PipelineBuilder};
pub use context::{PipelineState, RequestContext, RouteContext};
pub use stage::{Flow, Stage};

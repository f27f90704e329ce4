//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Request that passed policy and rate stages (method, path)
//!     → router.rs (group lookup by prefix)
//!     → matcher.rs (prefix strip, pattern match, params)
//!     → Return: Handled(Result<Response, Failure>) or NoMatch
//!
//! Route registration (at startup):
//!     RouteGroup::new("/api/tasks").get("/:id", handler)
//!     → Dispatcher::mount
//!     → Frozen inside the Pipeline
//! ```
//!
//! # Design Decisions
//! - Routes registered at startup, immutable at runtime
//! - No regex in hot path (segment matching only)
//! - Deterministic: same input always matches same route
//! - Explicit NoMatch rather than silent default

pub mod matcher;
pub mod router;

pub use router::{Dispatch, Dispatcher, FnHandler, Handler, RouteGroup};

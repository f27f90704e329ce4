//! Route groups served behind the pipeline.
//!
//! ```text
//! /api/auth   → auth.rs  (Google handshake, current user, logout)
//! /api/tasks  → tasks.rs (per-user task CRUD, identity required)
//! ```

pub mod auth;
pub mod tasks;

pub use tasks::TaskBook;

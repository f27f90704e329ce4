//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     authenticator.rs initialize → registry of strategies (once)
//!
//! Handshake (auth routes):
//!     GET /api/auth/google          → challenge → state kept in session → 302
//!     GET /api/auth/google/callback → state check → strategy.verify (timeout)
//!                                   → identity stored in session
//!
//! Every request:
//!     IdentityStage → session identity copied into RequestContext
//!     protected routes → authenticate(ctx) → Identity | Unauthenticated
//! ```

pub mod authenticator;
pub mod google;
pub mod strategy;

pub use authenticator::{Authenticator, IdentityStage};
pub use google::GoogleStrategy;
pub use strategy::{AuthError, Callback, Challenge, Identity, Strategy};

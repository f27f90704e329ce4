//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → sessions → authenticator.initialize()
//!         → limiter → stages → dispatcher → Pipeline
//!
//! Shutdown (shutdown.rs):
//!     Signal received → server stops accepting, drains → sweepers exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then shared state, then the listener
//! - Background tasks are tied to the same shutdown broadcast as the server

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::{spawn_signal_listener, wait_for_signal};
pub use startup::{Assembly, Gateway, StartupError};

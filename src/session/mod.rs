//! Session subsystem.
//!
//! # Data Flow
//! ```text
//! Request (Cookie: sid=<signed id>)
//!     → stage.rs (attach once per request)
//!     → store.rs (verify signature, load live data or mint a new session)
//!     → RequestContext.session
//!
//! Response:
//!     stage.rs finish → store.rs commit
//!         new session      → save + Set-Cookie (HttpOnly; Secure)
//!         destroyed        → removal cookie
//!         preflight + new  → nothing persisted
//! ```

pub mod stage;
pub mod store;

pub use stage::SessionStage;
pub use store::{
    MemorySessionBackend, SessionBackend, SessionData, SessionError, SessionHandle, SessionId,
    SessionStore,
};

//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request id + trace + body limit layers)
//!     → pipeline (stages, dispatch)
//!         route handlers use request.rs to decode JSON / form bodies
//!     → response.rs (error envelope, not-found)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{form_body, json_body, payload, X_REQUEST_ID};
pub use response::{ErrorEnvelope, Failure};
pub use server::{AppState, HttpServer, ServerError};

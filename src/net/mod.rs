//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! listener.tls unset → plain TCP listener (tokio) → axum::serve
//! listener.tls set   → tls.rs (load PEM cert + key) → axum_server rustls acceptor
//! ```

pub mod tls;

pub use tls::load_tls_config;

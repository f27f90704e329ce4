//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, overlay secrets from env)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → handed to startup, which builds the stores and stages
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Secrets may come from the environment so they stay out of files

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_from_env, ConfigError};
pub use validation::{validate_config, ValidationError};
pub use schema::{
    AuthConfig, CorsConfig, FrameOption, GatewayConfig, ListenerConfig, ObservabilityConfig,
    OriginMode, RateLimitConfig, RateLimitKey, SecurityConfig, SessionConfig, TlsConfig,
};

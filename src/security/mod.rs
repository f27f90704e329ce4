//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → policy.rs (queue security + CORS headers)
//!         OPTIONS → 200 {} with Allow-Methods, pipeline ends here
//!     → rate_limit.rs (charge the client key for this window)
//!         over quota → 429 envelope + Retry-After
//!     → Pass to logging and dispatch
//! ```
//!
//! # Design Decisions
//! - Header sets are built once at startup and copied per request
//! - Perimeter headers land on every response, rejections included
//! - Preflight never consumes rate-limit quota

pub mod cors;
pub mod headers;
pub mod policy;
pub mod rate_limit;

pub use cors::CorsPolicy;
pub use headers::SecurityHeaders;
pub use policy::PolicyStage;
pub use rate_limit::{
    key_extractor, Admission, KeyExtractor, MemoryRateLimitStore, PeerIpKey, Quota,
    RateLimitStage, RateLimitStore, RateLimiter, SessionKey,
};

//! Fixed-window rate limiting.
//!
//! # Responsibilities
//! - Count requests per client key inside a fixed window
//! - Reject with 429 once the quota is spent, until the window resets
//! - Emit draft-7 `RateLimit` / `RateLimit-Policy` headers on every counted response
//!
//! # Design Decisions
//! - Each key's window starts at its first request
//! - A request at exactly `window_start + window` opens a new window with count 1
//! - Increment and reset happen under the key's map entry (atomic per key)
//! - Quota is charged before dispatch and never refunded

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue, StatusCode};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

use crate::config::{RateLimitConfig, RateLimitKey};
use crate::http::response::ErrorEnvelope;
use crate::observability::metrics;
use crate::pipeline::{Flow, PipelineState, RequestContext, Stage};

const RATELIMIT: HeaderName = HeaderName::from_static("ratelimit");
const RATELIMIT_POLICY: HeaderName = HeaderName::from_static("ratelimit-policy");

/// Counter state after a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub count: u64,
    pub window_start: Instant,
}

/// Storage for per-key counters.
pub trait RateLimitStore: Send + Sync + 'static {
    /// Count one request for `key` at `now`, opening a new window if the current one elapsed.
    fn hit(&self, key: &str, now: Instant, window: Duration) -> Hit;

    /// Drop counters whose window elapsed at `now`.
    fn purge_expired(&self, now: Instant, window: Duration) -> usize;
}

#[derive(Debug)]
struct Counter {
    count: u64,
    window_start: Instant,
}

/// In-process counter store.
#[derive(Default)]
pub struct MemoryRateLimitStore {
    counters: DashMap<String, Counter>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

impl RateLimitStore for MemoryRateLimitStore {
    fn hit(&self, key: &str, now: Instant, window: Duration) -> Hit {
        let mut counter = self
            .counters
            .entry(key.to_owned())
            .or_insert_with(|| Counter {
                count: 0,
                window_start: now,
            });

        if now >= counter.window_start + window {
            counter.count = 0;
            counter.window_start = now;
        }
        counter.count = counter.count.saturating_add(1);

        Hit {
            count: counter.count,
            window_start: counter.window_start,
        }
    }

    fn purge_expired(&self, now: Instant, window: Duration) -> usize {
        let before = self.counters.len();
        self.counters.retain(|_, c| now < c.window_start + window);
        before.saturating_sub(self.counters.len())
    }
}

/// Quota state reported to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub limit: u64,
    pub remaining: u64,
    pub reset_after: Duration,
}

impl Quota {
    /// Seconds until reset, rounded up.
    pub fn reset_secs(&self) -> u64 {
        ceil_secs(self.reset_after)
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

/// Admission decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allow(Quota),
    Reject(Quota),
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow(_))
    }

    pub fn quota(&self) -> Quota {
        match self {
            Self::Allow(q) | Self::Reject(q) => *q,
        }
    }
}

/// Fixed-window limiter over a pluggable store.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    window: Duration,
    max: u64,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, window: Duration, max: u64) -> Self {
        Self { store, window, max }
    }

    pub fn from_config(config: &RateLimitConfig, store: Arc<dyn RateLimitStore>) -> Self {
        Self::new(store, Duration::from_millis(config.window_ms), config.max)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    /// Charge one request to `key`.
    pub fn admit(&self, key: &str) -> Admission {
        let now = Instant::now();
        let hit = self.store.hit(key, now, self.window);
        let reset_at = hit.window_start + self.window;

        let quota = Quota {
            limit: self.max,
            remaining: self.max.saturating_sub(hit.count),
            reset_after: reset_at.saturating_duration_since(now),
        };

        if hit.count <= self.max {
            Admission::Allow(quota)
        } else {
            Admission::Reject(quota)
        }
    }

    /// Periodically drop stale counters until shutdown.
    pub fn spawn_sweeper(&self, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(limiter.window);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let purged = limiter.store.purge_expired(Instant::now(), limiter.window);
                        if purged > 0 {
                            tracing::debug!(purged, "Stale rate-limit counters purged");
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }
        })
    }

    /// draft-7 headers for `quota`.
    pub fn write_headers(&self, quota: &Quota, target: &mut HeaderMap) {
        let policy = format!("{};w={}", self.max, ceil_secs(self.window));
        let state = format!(
            "limit={}, remaining={}, reset={}",
            quota.limit,
            quota.remaining,
            quota.reset_secs()
        );
        if let Ok(value) = HeaderValue::from_str(&policy) {
            target.insert(RATELIMIT_POLICY, value);
        }
        if let Ok(value) = HeaderValue::from_str(&state) {
            target.insert(RATELIMIT, value);
        }
    }
}

/// Derives the client key a request is counted against.
pub trait KeyExtractor: Send + Sync + 'static {
    fn extract(&self, ctx: &RequestContext, request: &Parts) -> String;
}

/// Keys by remote IP address.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeerIpKey;

impl KeyExtractor for PeerIpKey {
    fn extract(&self, ctx: &RequestContext, _request: &Parts) -> String {
        ctx.client_addr()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Keys by session id, falling back to the remote IP.
///
/// Only a session the client presented back counts as a key. A session minted
/// for this request is keyed by IP, so dropping the cookie does not reset the count.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionKey;

impl KeyExtractor for SessionKey {
    fn extract(&self, ctx: &RequestContext, request: &Parts) -> String {
        match ctx.session() {
            Some(session) if !session.is_new() => format!("session:{}", session.id()),
            _ => PeerIpKey.extract(ctx, request),
        }
    }
}

/// Extractor named by configuration.
pub fn key_extractor(key: RateLimitKey) -> Arc<dyn KeyExtractor> {
    match key {
        RateLimitKey::Ip => Arc::new(PeerIpKey),
        RateLimitKey::Session => Arc::new(SessionKey),
    }
}

/// Pipeline stage enforcing the quota.
pub struct RateLimitStage {
    limiter: RateLimiter,
    key: Arc<dyn KeyExtractor>,
    message: String,
}

impl RateLimitStage {
    pub fn new(limiter: RateLimiter, key: Arc<dyn KeyExtractor>, message: impl Into<String>) -> Self {
        Self {
            limiter,
            key,
            message: message.into(),
        }
    }
}

#[async_trait]
impl Stage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn reached(&self) -> PipelineState {
        PipelineState::RateChecked
    }

    async fn process(&self, ctx: &mut RequestContext, request: &Parts) -> Flow {
        let key = self.key.extract(ctx, request);
        let admission = self.limiter.admit(&key);
        let quota = admission.quota();
        self.limiter.write_headers(&quota, ctx.response_headers_mut());

        if admission.is_allowed() {
            return Flow::Continue;
        }

        tracing::warn!(
            request_id = %ctx.request_id(),
            client = %key,
            method = %request.method,
            path = %request.uri.path(),
            "Rate limit exceeded"
        );
        metrics::record_rate_limited();

        if let Ok(value) = HeaderValue::from_str(&quota.reset_secs().to_string()) {
            ctx.response_headers_mut().insert(header::RETRY_AFTER, value);
        }
        Flow::Respond(
            ErrorEnvelope::new(self.message.clone()).into_response_with(StatusCode::TOO_MANY_REQUESTS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use std::net::SocketAddr;

    const WINDOW: Duration = Duration::from_secs(15 * 60);

    fn limiter(max: u64) -> RateLimiter {
        RateLimiter::new(Arc::new(MemoryRateLimitStore::new()), WINDOW, max)
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_then_reject() {
        let limiter = limiter(100);
        for i in 1..=100 {
            let admission = limiter.admit("10.0.0.1");
            assert!(admission.is_allowed(), "request {i} should be admitted");
            assert_eq!(admission.quota().remaining, 100 - i);
        }
        let rejected = limiter.admit("10.0.0.1");
        assert!(!rejected.is_allowed());
        assert_eq!(rejected.quota().remaining, 0);

        assert!(limiter.admit("10.0.0.2").is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_reset_at_exact_boundary() {
        let limiter = limiter(2);
        assert!(limiter.admit("k").is_allowed());
        assert!(limiter.admit("k").is_allowed());
        assert!(!limiter.admit("k").is_allowed());

        tokio::time::advance(WINDOW - Duration::from_millis(1)).await;
        assert!(!limiter.admit("k").is_allowed());

        tokio::time::advance(Duration::from_millis(1)).await;
        let admission = limiter.admit("k");
        assert!(admission.is_allowed());
        // count restarted at 1, not 0
        assert_eq!(admission.quota().remaining, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_after_counts_down() {
        let limiter = limiter(5);
        limiter.admit("k");
        tokio::time::advance(Duration::from_secs(60)).await;
        let quota = limiter.admit("k").quota();
        assert_eq!(quota.reset_after, WINDOW - Duration::from_secs(60));
        assert_eq!(quota.reset_secs(), 840);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_counters() {
        let store = MemoryRateLimitStore::new();
        store.hit("a", Instant::now(), WINDOW);
        tokio::time::advance(Duration::from_secs(60)).await;
        store.hit("b", Instant::now(), WINDOW);

        tokio::time::advance(WINDOW - Duration::from_secs(30)).await;
        assert_eq!(store.purge_expired(Instant::now(), WINDOW), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_hits_are_not_lost() {
        let store = Arc::new(MemoryRateLimitStore::new());
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..250 {
                    store.hit("shared", Instant::now(), WINDOW);
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(store.hit("shared", Instant::now(), WINDOW).count, 2001);
    }

    #[test]
    fn test_draft7_headers() {
        let limiter = limiter(100);
        let quota = Quota {
            limit: 100,
            remaining: 42,
            reset_after: Duration::from_millis(1500),
        };
        let mut headers = HeaderMap::new();
        limiter.write_headers(&quota, &mut headers);

        assert_eq!(headers["ratelimit-policy"], "100;w=900");
        assert_eq!(headers["ratelimit"], "limit=100, remaining=42, reset=2");
    }

    fn parts() -> Parts {
        Request::builder().uri("/api/tasks").body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_key_extractors() {
        let addr: SocketAddr = "192.0.2.7:5000".parse().unwrap();
        let mut ctx = RequestContext::new("r", Some(addr));
        assert_eq!(PeerIpKey.extract(&ctx, &parts()), "192.0.2.7");
        assert_eq!(SessionKey.extract(&ctx, &parts()), "192.0.2.7");

        // minted by this request: still the IP
        ctx.attach_session(crate::session::SessionHandle::fresh());
        assert_eq!(SessionKey.extract(&ctx, &parts()), "192.0.2.7");
    }

    #[tokio::test]
    async fn test_session_key_uses_returning_session() {
        let config = crate::config::SessionConfig {
            secret: "limit-secret".into(),
            ..crate::config::SessionConfig::default()
        };
        let store = crate::session::SessionStore::in_memory(&config).unwrap();
        let minted = crate::session::SessionHandle::fresh();
        let id = minted.id();
        store.commit(&minted, &mut axum::response::Response::default());

        let addr: SocketAddr = "192.0.2.7:5000".parse().unwrap();
        let mut ctx = RequestContext::new("r", Some(addr));
        ctx.attach_session(store.get(&id).unwrap());
        assert_eq!(SessionKey.extract(&ctx, &parts()), format!("session:{id}"));
    }

    #[test]
    fn test_policy_window_rounds_up() {
        let mut headers = HeaderMap::new();
        let quota = Quota {
            limit: 5,
            remaining: 5,
            reset_after: Duration::from_millis(500),
        };
        RateLimiter::new(Arc::new(MemoryRateLimitStore::new()), Duration::from_millis(500), 5)
            .write_headers(&quota, &mut headers);
        assert_eq!(headers["ratelimit-policy"], "5;w=1");

        RateLimiter::new(Arc::new(MemoryRateLimitStore::new()), Duration::from_millis(1500), 5)
            .write_headers(&quota, &mut headers);
        assert_eq!(headers["ratelimit-policy"], "5;w=2");
    }

    #[test]
    fn test_unknown_peer_key() {

        let anonymous = RequestContext::new("r", None);
        assert_eq!(PeerIpKey.extract(&anonymous, &parts()), "unknown");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stage_rejects_with_429_and_headers() {
        let stage = RateLimitStage::new(limiter(1), Arc::new(PeerIpKey), "Too many requests");
        let addr: SocketAddr = "192.0.2.8:1".parse().unwrap();

        let mut first = RequestContext::new("r1", Some(addr));
        assert!(matches!(stage.process(&mut first, &parts()).await, Flow::Continue));
        assert!(first.take_response_headers().contains_key("ratelimit"));

        let mut second = RequestContext::new("r2", Some(addr));
        let Flow::Respond(response) = stage.process(&mut second, &parts()).await else {
            panic!("second request must be rejected");
        };
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let headers = second.take_response_headers();
        assert_eq!(headers[header::RETRY_AFTER], "900");
        assert_eq!(headers["ratelimit"], "limit=1, remaining=0, reset=900");
    }
}

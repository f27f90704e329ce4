//! Session storage and the signed session cookie.
//!
//! # Responsibilities
//! - Resolve the session cookie to a live session, or mint a new one
//! - Keep session data shared between concurrent requests of one client
//! - Expire idle sessions (rolling TTL) and sweep them periodically
//! - Write the `Set-Cookie` header for new and destroyed sessions
//!
//! # Design Decisions
//! - Cookie value is the session id signed with a key derived from the secret
//! - Unknown, expired or tampered cookies silently yield a new session
//! - Backends are pluggable; the in-memory one is a `DashMap`

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
    http::{header::SET_COOKIE, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, Key, SameSite, SignedCookieJar};
use dashmap::DashMap;
use parking_lot::RwLock;
use sha2::{Digest, Sha512};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use uuid::Uuid;

use crate::auth::Identity;
use crate::config::SessionConfig;

/// Opaque session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw).ok().map(Self)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Contents of a session.
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    pub identity: Option<Identity>,
    pub values: HashMap<String, serde_json::Value>,
}

/// Session data shared by every request carrying the same cookie.
pub type SharedSessionData = Arc<RwLock<SessionData>>;

/// A request's view of its session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    data: SharedSessionData,
    is_new: bool,
    destroyed: Arc<AtomicBool>,
}

impl SessionHandle {
    /// A session that is not yet in any store.
    pub fn fresh() -> Self {
        Self {
            id: SessionId::new(),
            data: Arc::new(RwLock::new(SessionData::default())),
            is_new: true,
            destroyed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn existing(id: SessionId, data: SharedSessionData) -> Self {
        Self {
            id,
            data,
            is_new: false,
            destroyed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Created by this request.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    pub fn identity(&self) -> Option<Identity> {
        self.data.read().identity.clone()
    }

    pub fn set_identity(&self, identity: Identity) {
        self.data.write().identity = Some(identity);
    }

    pub fn clear_identity(&self) {
        self.data.write().identity = None;
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.data.read().values.get(key).cloned()
    }

    pub fn insert(&self, key: impl Into<String>, value: serde_json::Value) {
        self.data.write().values.insert(key.into(), value);
    }

    pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.data.write().values.remove(key)
    }
}

/// Storage for session data.
///
/// Implementations must make `load` and `save` atomic per id.
pub trait SessionBackend: Send + Sync + 'static {
    /// Live data for `id`, pushing its expiry to `expires_at`. Expired entries are dropped.
    fn load(&self, id: &SessionId, now: Instant, expires_at: Instant) -> Option<SharedSessionData>;

    fn save(&self, id: SessionId, data: SharedSessionData, expires_at: Instant);

    fn remove(&self, id: &SessionId);

    /// Drop every entry expired at `now`; returns how many were dropped.
    fn purge_expired(&self, now: Instant) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Entry {
    data: SharedSessionData,
    expires_at: Instant,
}

/// In-process session backend.
#[derive(Default)]
pub struct MemorySessionBackend {
    entries: DashMap<SessionId, Entry>,
}

impl MemorySessionBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionBackend for MemorySessionBackend {
    fn load(&self, id: &SessionId, now: Instant, expires_at: Instant) -> Option<SharedSessionData> {
        let mut entry = self.entries.get_mut(id)?;
        if entry.expires_at <= now {
            drop(entry);
            self.entries.remove_if(id, |_, e| e.expires_at <= now);
            return None;
        }
        entry.expires_at = expires_at;
        Some(entry.data.clone())
    }

    fn save(&self, id: SessionId, data: SharedSessionData, expires_at: Instant) {
        self.entries.insert(id, Entry { data, expires_at });
    }

    fn remove(&self, id: &SessionId) {
        self.entries.remove(id);
    }

    fn purge_expired(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Session store construction errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session secret must not be empty")]
    EmptySecret,
}

/// The session store handed to the pipeline and to route handlers.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn SessionBackend>,
    key: Key,
    cookie_name: Arc<str>,
    secure: bool,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(config: &SessionConfig, backend: Arc<dyn SessionBackend>) -> Result<Self, SessionError> {
        if config.secret.is_empty() {
            return Err(SessionError::EmptySecret);
        }
        let digest = Sha512::digest(config.secret.as_bytes());

        Ok(Self {
            backend,
            key: Key::from(digest.as_slice()),
            cookie_name: Arc::from(config.cookie_name.as_str()),
            secure: config.secure,
            ttl: Duration::from_secs(config.ttl_secs),
        })
    }

    /// In-memory store.
    pub fn in_memory(config: &SessionConfig) -> Result<Self, SessionError> {
        Self::new(config, Arc::new(MemorySessionBackend::new()))
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Resolve the request's session, creating one if needed. Never fails.
    pub fn attach(&self, headers: &HeaderMap) -> SessionHandle {
        let jar: SignedCookieJar = SignedCookieJar::from_headers(headers, self.key.clone());
        let Some(cookie) = jar.get(&self.cookie_name) else {
            return SessionHandle::fresh();
        };

        let now = Instant::now();
        match SessionId::parse(cookie.value())
            .and_then(|id| self.backend.load(&id, now, now + self.ttl).map(|data| (id, data)))
        {
            Some((id, data)) => SessionHandle::existing(id, data),
            None => {
                tracing::debug!("Session cookie refers to no live session, starting a new one");
                SessionHandle::fresh()
            }
        }
    }

    /// Look up a live session by id.
    pub fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        let now = Instant::now();
        self.backend
            .load(id, now, now + self.ttl)
            .map(|data| SessionHandle::existing(*id, data))
    }

    /// Persist a new session and set its cookie, or clear the cookie of a destroyed one.
    pub fn commit(&self, session: &SessionHandle, response: &mut Response) {
        if session.is_destroyed() {
            let mut removal = self.cookie(String::new());
            removal.make_removal();
            if let Ok(value) = HeaderValue::from_str(&removal.to_string()) {
                response.headers_mut().append(SET_COOKIE, value);
            }
            return;
        }
        if !session.is_new() {
            return;
        }

        self.backend
            .save(session.id, session.data.clone(), Instant::now() + self.ttl);

        let jar: SignedCookieJar =
            SignedCookieJar::new(self.key.clone()).add(self.cookie(session.id.to_string()));
        let inner = std::mem::take(response);
        *response = (jar, inner).into_response();
    }

    /// End a session (logout).
    pub fn destroy(&self, session: &SessionHandle) {
        session.destroyed.store(true, Ordering::Release);
        session.clear_identity();
        self.backend.remove(&session.id);
    }

    pub fn purge_expired(&self) -> usize {
        self.backend.purge_expired(Instant::now())
    }

    pub fn len(&self) -> usize {
        self.backend.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backend.is_empty()
    }

    /// Periodically purge expired sessions until shutdown.
    pub fn spawn_sweeper(
        &self,
        every: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let purged = store.purge_expired();
                        if purged > 0 {
                            tracing::debug!(purged, remaining = store.len(), "Expired sessions purged");
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }
        })
    }

    fn cookie(&self, value: String) -> Cookie<'static> {
        Cookie::build((self.cookie_name.to_string(), value))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::COOKIE;

    fn store() -> SessionStore {
        let config = SessionConfig {
            secret: "unit-test-secret".into(),
            ttl_secs: 60,
            ..SessionConfig::default()
        };
        SessionStore::in_memory(&config).unwrap()
    }

    fn set_cookie_pair(response: &Response) -> String {
        let raw = response.headers()[SET_COOKIE].to_str().unwrap();
        raw.split(';').next().unwrap().to_string()
    }

    fn headers_with(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        let config = SessionConfig::default();
        assert!(matches!(
            SessionStore::in_memory(&config),
            Err(SessionError::EmptySecret)
        ));
    }

    #[tokio::test]
    async fn test_missing_cookie_creates_session_and_sets_cookie() {
        let store = store();
        let session = store.attach(&HeaderMap::new());
        assert!(session.is_new());

        let mut response = Response::default();
        store.commit(&session, &mut response);

        let raw = response.headers()[SET_COOKIE].to_str().unwrap().to_string();
        assert!(raw.contains("HttpOnly"));
        assert!(raw.contains("Secure"));
        assert!(raw.contains("Path=/"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_signed_cookie_resolves_same_session() {
        let store = store();
        let first = store.attach(&HeaderMap::new());
        first.insert("visits", serde_json::json!(1));
        let mut response = Response::default();
        store.commit(&first, &mut response);

        let second = store.attach(&headers_with(&set_cookie_pair(&response)));
        assert!(!second.is_new());
        assert_eq!(second.id(), first.id());
        assert_eq!(second.get("visits"), Some(serde_json::json!(1)));

        let mut untouched = Response::default();
        store.commit(&second, &mut untouched);
        assert!(untouched.headers().get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_tampered_cookie_starts_new_session() {
        let store = store();
        let session = store.attach(&HeaderMap::new());
        let mut response = Response::default();
        store.commit(&session, &mut response);

        let forged = format!("sid={}", SessionId::new());
        let attached = store.attach(&headers_with(&forged));
        assert!(attached.is_new());
        assert_ne!(attached.id(), session.id());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_sessions_expire() {
        let store = store();
        let session = store.attach(&HeaderMap::new());
        let mut response = Response::default();
        store.commit(&session, &mut response);
        let cookie = set_cookie_pair(&response);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(!store.attach(&headers_with(&cookie)).is_new());

        // rolling: the access above pushed expiry to t=90s
        tokio::time::advance(Duration::from_secs(45)).await;
        assert!(!store.attach(&headers_with(&cookie)).is_new());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(store.attach(&headers_with(&cookie)).is_new());
        assert_eq!(store.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = store();
        for _ in 0..3 {
            let s = store.attach(&HeaderMap::new());
            store.commit(&s, &mut Response::default());
        }
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(store.purge_expired(), 3);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_destroy_clears_cookie_and_entry() {
        let store = store();
        let session = store.attach(&HeaderMap::new());
        store.commit(&session, &mut Response::default());
        let existing = store.get(&session.id()).unwrap();

        store.destroy(&existing);
        let mut response = Response::default();
        store.commit(&existing, &mut response);

        assert!(store.get(&session.id()).is_none());
        let raw = response.headers()[SET_COOKIE].to_str().unwrap();
        assert!(raw.starts_with("sid=;"));
        assert!(raw.contains("Max-Age=0"));
    }
}

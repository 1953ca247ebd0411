//! Session lifecycle: the TTL key-value store adapter, cookie plumbing, and the
//! resolver middleware that turns a cookie into a request-scoped [`Identity`].
//!
//! Sessions are ephemeral and owned entirely by this module: created on login,
//! deleted on logout, deleted lazily by the resolver on first observed expiry,
//! never updated in place.

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header::InvalidHeaderValue},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use uuid::Uuid;

use crate::{
    AppState,
    auth::{Identity, Tier},
    config::Env,
    error::StoreError,
};

/// Name of the session cookie shared by both tiers.
pub const SESSION_COOKIE: &str = "portal_session";

/// SessionRecord
///
/// One authenticated session. The token doubles as the store key; it is a fresh
/// random UUID per login, never reused and never derived from user data.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub token: String,
    /// Fixed at creation, immutable for the record's lifetime.
    pub tier: Tier,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Captured for audit only; plays no part in authorization decisions.
    pub origin_ip: String,
}

impl SessionRecord {
    /// Mints a new session for `tier`, expiring after the tier's TTL.
    pub fn new(tier: Tier, origin_ip: String) -> Self {
        let created_at = Utc::now();
        Self {
            token: Uuid::new_v4().to_string(),
            tier,
            created_at,
            expires_at: created_at + tier.session_ttl(),
            origin_ip,
        }
    }

    /// A record is valid iff `now < expires_at`. The resolver re-checks this even
    /// though the store also evicts, because store eviction is allowed to lag.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Seconds until logical expiry, clamped at zero. This is what gets handed to
    /// the store as its eviction TTL, keeping store-level eviction and logical
    /// expiry consistent.
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}

/// SessionStore
///
/// The TTL key-value store adapter contract. No transactional guarantees beyond
/// single-key atomicity are assumed or required.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores the session; the store may evict it any time after `ttl` elapses.
    async fn put(&self, record: SessionRecord, ttl: Duration) -> Result<(), StoreError>;
    async fn get(&self, token: &str) -> Result<Option<SessionRecord>, StoreError>;
    async fn delete(&self, token: &str) -> Result<(), StoreError>;
}

/// SessionState
///
/// The concrete type used to share session store access across the application state.
pub type SessionState = Arc<dyn SessionStore>;

struct StoredEntry {
    record: SessionRecord,
    evict_at: DateTime<Utc>,
}

/// InMemorySessionStore
///
/// Sessions in a `HashMap` behind an `RwLock`, keyed by token. Eviction is lazy:
/// entries past their TTL are dropped when next touched and opportunistically
/// pruned on writes, so a `get` can briefly observe a logically expired record.
/// That is exactly the eviction lag the resolver's own expiry check covers.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    entries: Arc<RwLock<HashMap<String, StoredEntry>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-evicted) entries. Test helper.
    pub fn len(&self) -> usize {
        let now = Utc::now();
        self.entries
            .read()
            .map(|map| map.values().filter(|e| e.evict_at > now).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put(&self, record: SessionRecord, ttl: Duration) -> Result<(), StoreError> {
        let now = Utc::now();
        let evict_at = now
            + chrono::Duration::from_std(ttl)
                .map_err(|e| StoreError(format!("ttl out of range: {e}")))?;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError("session store lock poisoned".into()))?;
        // Opportunistic sweep keeps the map bounded without a background task.
        entries.retain(|_, entry| entry.evict_at > now);
        entries.insert(record.token.clone(), StoredEntry { record, evict_at });
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<Option<SessionRecord>, StoreError> {
        let now = Utc::now();
        let entries = self
            .entries
            .read()
            .map_err(|_| StoreError("session store lock poisoned".into()))?;
        Ok(entries
            .get(token)
            .filter(|entry| entry.evict_at > now)
            .map(|entry| entry.record.clone()))
    }

    async fn delete(&self, token: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .map_err(|_| StoreError("session store lock poisoned".into()))?
            .remove(token);
        Ok(())
    }
}

/// FailingSessionStore
///
/// A store whose every operation fails. Used exclusively in tests to exercise the
/// fail-open (resolution) and fail-closed (login) paths.
#[derive(Clone, Default)]
pub struct FailingSessionStore;

#[async_trait]
impl SessionStore for FailingSessionStore {
    async fn put(&self, _record: SessionRecord, _ttl: Duration) -> Result<(), StoreError> {
        Err(StoreError("simulated session store outage".into()))
    }

    async fn get(&self, _token: &str) -> Result<Option<SessionRecord>, StoreError> {
        Err(StoreError("simulated session store outage".into()))
    }

    async fn delete(&self, _token: &str) -> Result<(), StoreError> {
        Err(StoreError("simulated session store outage".into()))
    }
}

// --- Cookie helpers ---

/// Builds the `Set-Cookie` value that installs a session token.
/// `Secure` is only appended outside local development so the cookie still works
/// over plain HTTP on a dev machine.
pub fn session_cookie(
    token: &str,
    ttl: Duration,
    env: Env,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let max_age = ttl.as_secs();
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Strict; Max-Age={max_age}"
    );
    if env == Env::Production {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Builds the `Set-Cookie` value that clears the session cookie on logout.
pub fn clear_session_cookie(env: Env) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0");
    if env == Env::Production {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Extracts the session token from the `Cookie` header, if present.
pub fn cookie_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(axum::http::header::COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE {
            return Some(val.to_string());
        }
    }
    None
}

// --- Resolver middleware ---

/// resolve_session
///
/// Runs on every request, before routing. Reads the session cookie, loads and
/// validates the record, and attaches the resolved [`Identity`] to the request
/// extensions for the guards and handlers downstream.
///
/// Expired records are deleted on first observation and the request continues
/// anonymously; expiry is normal state decay, not an error. A store failure is
/// treated identically to "absent" (fail open to anonymous): session resolution
/// must never take a request down with the store.
pub async fn resolve_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = cookie_token(request.headers()) {
        match state.sessions.get(&token).await {
            Ok(Some(record)) => {
                if record.is_expired(Utc::now()) {
                    if let Err(err) = state.sessions.delete(&token).await {
                        tracing::debug!("failed to evict expired session: {err}");
                    }
                } else {
                    request.extensions_mut().insert(Identity { tier: record.tier });
                }
            }
            Ok(None) => {}
            Err(err) => {
                tracing::error!("session lookup failed, continuing anonymous: {err}");
            }
        }
    }
    next.run(request).await
}

//! Identity tiers, the shared-secret credential verifier, the login throttle,
//! and the route-scoped access guard.

use axum::{
    extract::{FromRequestParts, Request},
    http::{HeaderMap, StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::config::AppConfig;

/// Tier
///
/// A disjoint authenticated identity class. Each tier has its own login path,
/// its own shared secret, and its own session TTL. Tiers are *not* hierarchical:
/// an administrator session does not satisfy the member guard, nor vice versa.
/// They are separate capability sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Member,
    Administrator,
}

impl Tier {
    /// Session lifetime for this tier. Administrator sessions are deliberately
    /// short-lived relative to member sessions.
    pub fn session_ttl(self) -> Duration {
        match self {
            Tier::Member => Duration::hours(24),
            Tier::Administrator => Duration::hours(1),
        }
    }

    /// Where an unauthenticated browser navigation gets redirected.
    pub fn login_path(self) -> &'static str {
        match self {
            Tier::Member => "/nsfw/login",
            Tier::Administrator => "/admin/login",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Member => f.write_str("member"),
            Tier::Administrator => f.write_str("administrator"),
        }
    }
}

/// Identity
///
/// The resolved identity of an authenticated request, attached to request
/// extensions by the session resolver. Absence means anonymous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub tier: Tier,
}

/// MaybeIdentity
///
/// Extractor for handlers that behave differently for authenticated and anonymous
/// callers without requiring either (e.g. the status endpoint). Never rejects.
#[derive(Debug, Clone, Copy)]
pub struct MaybeIdentity(pub Option<Identity>);

impl<S> FromRequestParts<S> for MaybeIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeIdentity(parts.extensions.get::<Identity>().copied()))
    }
}

/// CredentialVerifier
///
/// Compares a submitted secret against the one configured secret for a tier.
/// Stateless by contract. This is a shared-password scheme (a deliberate
/// simplification for a single-operator site), isolated behind this struct so a
/// per-account credential backend could replace it without touching the session
/// or guard layers.
#[derive(Clone)]
pub struct CredentialVerifier {
    member_secret: String,
    admin_secret: String,
}

impl CredentialVerifier {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            member_secret: config.member_password.clone(),
            admin_secret: config.admin_password.clone(),
        }
    }

    pub fn verify(&self, tier: Tier, supplied: &str) -> bool {
        let expected = match tier {
            Tier::Member => &self.member_secret,
            Tier::Administrator => &self.admin_secret,
        };
        supplied == expected
    }
}

/// How many failed attempts a single client gets per window before logins from
/// it are rejected outright.
const THROTTLE_LIMIT: u32 = 5;
const THROTTLE_WINDOW_MINUTES: i64 = 10;

struct AttemptWindow {
    started_at: DateTime<Utc>,
    failures: u32,
}

/// LoginThrottle
///
/// Fixed-window failure counter per client IP, consulted before the verifier
/// runs. Successful logins clear the client's window, so the happy path is
/// observably unchanged; only repeated failures trip the limit.
#[derive(Default)]
pub struct LoginThrottle {
    windows: RwLock<HashMap<String, AttemptWindow>>,
}

impl LoginThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if this client may attempt a login right now.
    pub fn allow(&self, client: &str) -> bool {
        let Ok(windows) = self.windows.read() else {
            // A poisoned lock must not lock everyone out of the site.
            return true;
        };
        match windows.get(client) {
            Some(window) => {
                Utc::now() - window.started_at >= Duration::minutes(THROTTLE_WINDOW_MINUTES)
                    || window.failures < THROTTLE_LIMIT
            }
            None => true,
        }
    }

    pub fn record_failure(&self, client: &str) {
        let Ok(mut windows) = self.windows.write() else {
            return;
        };
        let now = Utc::now();
        let window = windows.entry(client.to_string()).or_insert(AttemptWindow {
            started_at: now,
            failures: 0,
        });
        if now - window.started_at >= Duration::minutes(THROTTLE_WINDOW_MINUTES) {
            window.started_at = now;
            window.failures = 0;
        }
        window.failures += 1;
    }

    pub fn clear(&self, client: &str) {
        if let Ok(mut windows) = self.windows.write() {
            windows.remove(client);
        }
    }
}

/// client_ip
///
/// Best-effort client address for audit records and the login throttle, taken
/// from the forwarding headers an edge proxy sets. Never used for authorization.
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// wants_html
///
/// Distinguishes browser navigations from API-style calls so guard failures can
/// redirect the former to a login page and give the latter a bare 401.
fn wants_html(headers: &HeaderMap) -> bool {
    if let Some(mode) = headers.get("sec-fetch-mode").and_then(|v| v.to_str().ok()) {
        return mode == "navigate";
    }
    headers
        .get(axum::http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

/// The shared guard body. Tier mismatch is treated identically to no identity:
/// the response never reveals whether some other session existed.
async fn enforce_tier(required: Tier, request: Request, next: Next) -> Response {
    match request.extensions().get::<Identity>() {
        Some(identity) if identity.tier == required => next.run(request).await,
        _ => {
            if wants_html(request.headers()) {
                Redirect::to(required.login_path()).into_response()
            } else {
                StatusCode::UNAUTHORIZED.into_response()
            }
        }
    }
}

/// require_member
///
/// Route layer for the members (NSFW) area.
pub async fn require_member(request: Request, next: Next) -> Response {
    enforce_tier(Tier::Member, request, next).await
}

/// require_admin
///
/// Route layer for the administrator API.
pub async fn require_admin(request: Request, next: Next) -> Response {
    enforce_tier(Tier::Administrator, request, next).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifier_matches_only_the_tier_secret() {
        let config = AppConfig::default();
        let verifier = CredentialVerifier::from_config(&config);

        assert!(verifier.verify(Tier::Member, "member-test-password"));
        assert!(verifier.verify(Tier::Administrator, "admin-test-password"));

        // Secrets do not cross tiers.
        assert!(!verifier.verify(Tier::Member, "admin-test-password"));
        assert!(!verifier.verify(Tier::Administrator, "member-test-password"));
        assert!(!verifier.verify(Tier::Member, ""));
    }

    #[test]
    fn throttle_trips_after_limit_and_clears_on_success() {
        let throttle = LoginThrottle::new();
        let client = "198.51.100.9";

        for _ in 0..THROTTLE_LIMIT {
            assert!(throttle.allow(client));
            throttle.record_failure(client);
        }
        assert!(!throttle.allow(client));

        throttle.clear(client);
        assert!(throttle.allow(client));
    }

    #[test]
    fn throttle_isolates_clients() {
        let throttle = LoginThrottle::new();
        for _ in 0..THROTTLE_LIMIT {
            throttle.record_failure("198.51.100.9");
        }
        assert!(!throttle.allow("198.51.100.9"));
        assert!(throttle.allow("203.0.113.4"));
    }

    #[test]
    fn forwarded_ip_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.4, 10.0.0.1".parse().unwrap(),
        );
        assert_eq!(client_ip(&headers), "203.0.113.4");

        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
    }

    #[test]
    fn navigation_detection() {
        let mut headers = HeaderMap::new();
        headers.insert("sec-fetch-mode", "navigate".parse().unwrap());
        assert!(wants_html(&headers));

        let mut headers = HeaderMap::new();
        headers.insert("sec-fetch-mode", "cors".parse().unwrap());
        assert!(!wants_html(&headers));

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::ACCEPT,
            "text/html,application/xhtml+xml".parse().unwrap(),
        );
        assert!(wants_html(&headers));

        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::ACCEPT, "application/json".parse().unwrap());
        assert!(!wants_html(&headers));
    }
}

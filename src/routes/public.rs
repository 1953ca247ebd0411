use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Defines endpoints that are **unauthenticated** and accessible to any client.
/// The session resolver still runs in front of these (a logged-in caller of
/// `/api/status` sees their session reflected), but nothing here requires an
/// identity.
///
/// Login endpoints are deliberately public: they are how identities come to
/// exist. Logout is public too, since clearing a cookie must work even when the
/// session behind it has already expired.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // A simple, unauthenticated endpoint used for monitoring and load balancer checks.
        .route("/health", get(|| async { "ok" }))
        // GET /api/status
        // Service/environment summary plus whether the caller has an active session.
        .route("/api/status", get(handlers::api_status))
        // POST /api/contact
        // The visitor contact form. The age gate runs here, before any record is
        // persisted.
        .route("/api/contact", post(handlers::create_submission))
        // POST /nsfw/login | /admin/login
        // Shared-password logins, one per tier. The member variant additionally
        // requires the age/consent confirmation.
        .route("/nsfw/login", post(handlers::login_member))
        .route("/admin/login", post(handlers::login_admin))
        // POST /nsfw/logout | /admin/logout
        // Both paths clear whatever session the cookie carries; the handler is
        // tier-agnostic.
        .route("/nsfw/logout", post(handlers::logout))
        .route("/admin/logout", post(handlers::logout))
}

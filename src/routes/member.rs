use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Member Router Module
///
/// Routes for holders of a member-tier session: the age-restricted members area.
///
/// Access Control:
/// This router is wrapped in `require_member` by `create_router`. The guard
/// redirects anonymous browser navigations to `/nsfw/login` and answers
/// API-style requests with a bare 401. An administrator session does **not**
/// pass this guard: tiers are disjoint capability sets, not a hierarchy.
pub fn member_routes() -> Router<AppState> {
    Router::new()
        // GET /nsfw
        // The unlocked members-area payload (platform links). Page rendering is a
        // front-end concern; the guard on this data is what matters here.
        .route("/nsfw", get(handlers::member_area))
}

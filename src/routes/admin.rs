use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Admin Router Module
///
/// Defines the routes exclusively accessible to administrator-tier sessions:
/// submission review, the workflow status transitions, and the NSFW approval.
///
/// Access Control:
/// The entire router is nested under `/api/admin` and wrapped in the
/// `require_admin` layer by `create_router`. A member session is rejected
/// identically to no session at all.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /api/admin/contacts
        // Lists every submission, newest first, for the review queue.
        .route("/contacts", get(handlers::list_submissions))
        // GET /api/admin/stats
        // Dashboard counters (totals, NSFW requests, unread, pending approvals).
        .route("/stats", get(handlers::get_admin_stats))
        // PUT /api/admin/contacts/{id}/status
        // Moves a submission through the visible workflow (new/read/replied/archived).
        // 'approved' is rejected here; it belongs to the approval transition below.
        .route(
            "/contacts/{id}/status",
            put(handlers::update_submission_status),
        )
        // POST /api/admin/contacts/{id}/approve-nsfw
        // The one-shot NSFW capability grant. Succeeds at most once per submission.
        .route(
            "/contacts/{id}/approve-nsfw",
            post(handlers::approve_nsfw),
        )
}

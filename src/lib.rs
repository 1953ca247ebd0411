use axum::{Router, http::HeaderName, middleware};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod approval;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod repository;
pub mod session;

// Module for routing segregation (Public, Member, Admin).
pub mod routes;
use routes::{admin, member, public};

use auth::{CredentialVerifier, LoginThrottle, require_admin, require_member};
use session::resolve_session;

// --- Public Re-exports ---

// Makes core state types easily accessible to the application entry point and tests.
pub use config::AppConfig;
pub use notify::{NoopNotifier, NotifierState, WebhookNotifier};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use session::{InMemorySessionStore, SessionState};

/// ApiDoc
///
/// Auto-generates the OpenAPI documentation (Swagger JSON) for the application
/// from the `#[utoipa::path]` and `#[derive(utoipa::ToSchema)]` annotations.
/// The resulting JSON is served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login_member, handlers::login_admin, handlers::logout,
        handlers::create_submission, handlers::list_submissions,
        handlers::update_submission_status, handlers::approve_nsfw,
        handlers::get_admin_stats, handlers::member_area, handlers::api_status,
    ),
    components(
        schemas(
            models::Submission, models::SubmissionStatus, models::CreateSubmissionRequest,
            models::LoginRequest, models::StatusUpdateRequest, models::DashboardStats,
            models::StatusResponse, models::SessionSummary, models::MemberArea,
            models::PlatformLink,
        )
    ),
    tags(
        (name = "creator-portal", description = "Creator site backend API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, thread-safe, immutable container holding all essential application
/// services and configuration, shared across all incoming requests.
#[derive(Clone)]
pub struct AppState {
    /// Persistence for submissions and their lifecycle.
    pub repo: RepositoryState,
    /// The TTL key-value store behind session tokens.
    pub sessions: SessionState,
    /// Shared-secret verification, one secret per tier.
    pub verifier: Arc<CredentialVerifier>,
    /// Per-client login failure throttle.
    pub throttle: Arc<LoginThrottle>,
    /// Best-effort email/analytics side channel.
    pub notifier: NotifierState,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
}

impl AppState {
    /// Assembles the state from its backing services. The verifier and throttle
    /// are derived here so the entry point and the tests build them identically.
    pub fn new(
        repo: RepositoryState,
        sessions: SessionState,
        notifier: NotifierState,
        config: AppConfig,
    ) -> Self {
        Self {
            verifier: Arc::new(CredentialVerifier::from_config(&config)),
            throttle: Arc::new(LoginThrottle::new()),
            repo,
            sessions,
            notifier,
            config,
        }
    }
}

/// create_router
///
/// Assembles the application's entire routing structure, applies global and
/// scoped middleware, and registers the application state.
///
/// The session resolver runs for every request, before routing, so that by the
/// time a tier guard or a handler executes, the request either carries a
/// resolved `Identity` extension or is definitively anonymous.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public routes: no guard.
        .merge(public::public_routes())
        // Member routes: guarded by the member-tier check.
        .merge(member::member_routes().route_layer(middleware::from_fn(require_member)))
        // Admin routes: nested under '/api/admin' and guarded by the admin-tier check.
        .nest(
            "/api/admin",
            admin::admin_routes().route_layer(middleware::from_fn(require_admin)),
        )
        .with_state(state.clone());

    // 3. Observability, correlation, and session resolution (outermost layers).
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID generation: a unique UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request tracing: wraps the request/response lifecycle in a span
                // correlated by the generated request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID propagation back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id))
                // 3d. Session resolution: cookie -> Identity extension, fail-open.
                // Runs after the layers above but before routing and the guards.
                .layer(middleware::from_fn_with_state(state, resolve_session)),
        )
        // 4. CORS layer.
        .layer(cors)
}

/// trace_span_logger
///
/// Helper used by `TraceLayer` to customize span creation: includes the
/// `x-request-id` header (if present) alongside the HTTP method and URI so every
/// log line for a single request is correlated by a unique ID.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}

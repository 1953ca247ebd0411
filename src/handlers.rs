use crate::{
    AppState,
    approval::{self, NsfwState},
    auth::{MaybeIdentity, Tier, client_ip},
    error::ApiError,
    models::{
        CreateSubmissionRequest, DashboardStats, LoginRequest, MemberArea, NewSubmission,
        PlatformLink, SessionSummary, StatusResponse, StatusUpdateRequest, Submission,
        SubmissionStatus,
    },
    notify::{NotifyEvent, dispatch},
    session::{SessionRecord, clear_session_cookie, cookie_token, session_cookie},
};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;

// --- Authentication ---

/// The shared login flow for both tiers: throttle, verify, mint a session, set
/// the cookie. Wrong secrets get the same generic message regardless of tier or
/// cause: with shared passwords there is nothing to enumerate, and we keep it
/// that way.
async fn login(
    state: AppState,
    headers: HeaderMap,
    tier: Tier,
    payload: LoginRequest,
) -> Result<impl IntoResponse, ApiError> {
    let client = client_ip(&headers);

    if !state.throttle.allow(&client) {
        return Err(ApiError::TooManyAttempts);
    }

    if !state.verifier.verify(tier, &payload.password) {
        state.throttle.record_failure(&client);
        return Err(ApiError::Auth);
    }
    state.throttle.clear(&client);

    let record = SessionRecord::new(tier, client.clone());
    let ttl = record.remaining_ttl(Utc::now());
    let token = record.token.clone();

    // Session creation fails closed: a session we could not store is a session
    // that does not exist.
    state.sessions.put(record, ttl).await.map_err(|err| {
        tracing::error!("failed to store session: {err}");
        ApiError::Unavailable
    })?;

    let cookie =
        session_cookie(&token, ttl, state.config.env).map_err(|_| ApiError::Unavailable)?;

    dispatch(
        &state.notifier,
        NotifyEvent::LoginSucceeded {
            tier,
            origin_ip: client,
        },
    );

    Ok((
        [(SET_COOKIE, cookie)],
        Json(json!({ "success": true, "message": "Login successful" })),
    ))
}

/// login_member
///
/// [Public Route] Member (NSFW area) login. In addition to the shared secret,
/// the caller must affirm the age/consent checkbox; without it the password is
/// not even checked.
#[utoipa::path(
    post,
    path = "/nsfw/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session created"),
        (status = 400, description = "Age confirmation missing"),
        (status = 401, description = "Invalid password"),
        (status = 429, description = "Throttled")
    )
)]
pub async fn login_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !payload.age_confirmed {
        return Err(ApiError::Validation(
            "You must confirm you are 18 or older.".to_string(),
        ));
    }
    login(state, headers, Tier::Member, payload).await
}

/// login_admin
///
/// [Public Route] Administrator login.
#[utoipa::path(
    post,
    path = "/admin/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session created"),
        (status = 401, description = "Invalid password"),
        (status = 429, description = "Throttled")
    )
)]
pub async fn login_admin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    login(state, headers, Tier::Administrator, payload).await
}

/// logout
///
/// [Public Route] Deletes the session record and clears the cookie. Deliberately
/// tolerant: a missing or already-deleted session still results in a cleared
/// cookie and a success response.
#[utoipa::path(
    post,
    path = "/nsfw/logout",
    responses((status = 200, description = "Session cleared"))
)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = cookie_token(&headers) {
        if let Err(err) = state.sessions.delete(&token).await {
            tracing::error!("failed to delete session on logout: {err}");
        }
    }

    let mut response_headers = HeaderMap::new();
    // Always clear the cookie, even if there was no record behind it.
    if let Ok(cookie) = clear_session_cookie(state.config.env) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (response_headers, Json(json!({ "success": true })))
}

// --- Submissions ---

/// create_submission
///
/// [Public Route] Handles the contact form. The age gate runs before anything is
/// persisted: an NSFW request without a birthday, or with a computed age under
/// 18, is rejected here and no record ever exists. `has_nsfw_interest` is derived
/// from the interests; whatever the client might claim elsewhere is ignored.
#[utoipa::path(
    post,
    path = "/api/contact",
    request_body = CreateSubmissionRequest,
    responses(
        (status = 201, description = "Created", body = Submission),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn create_submission(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateSubmissionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let has_nsfw_interest = approval::validate_age_gate(&payload, Utc::now().date_naive())
        .map_err(|err| ApiError::Validation(err.to_string()))?;

    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let new = NewSubmission {
        first_name: payload.first_name,
        last_name: payload.last_name,
        email: payload.email,
        mobile_number: payload.mobile_number,
        gender: payload.gender,
        birthday: payload.birthday,
        city: payload.city,
        region: payload.region,
        message: payload.message,
        interests: payload.interests,
        has_nsfw_interest,
        sms_opt_in: payload.sms_opt_in,
        origin_ip: client_ip(&headers),
        user_agent,
    };

    // Persistence fails closed; a dropped write would corrupt the lifecycle.
    let submission = state.repo.create(new).await?;

    dispatch(
        &state.notifier,
        NotifyEvent::SubmissionReceived {
            name: format!("{} {}", submission.first_name, submission.last_name),
            email: submission.email.clone(),
            interests: submission.interests.clone(),
            nsfw_requested: submission.has_nsfw_interest,
        },
    );

    Ok((StatusCode::CREATED, Json(submission)))
}

/// list_submissions
///
/// [Admin Route] All submissions, newest first.
#[utoipa::path(
    get,
    path = "/api/admin/contacts",
    responses((status = 200, description = "All submissions", body = [Submission]))
)]
pub async fn list_submissions(
    State(state): State<AppState>,
) -> Result<Json<Vec<Submission>>, ApiError> {
    Ok(Json(state.repo.list().await?))
}

/// update_submission_status
///
/// [Admin Route] Moves a submission through the workflow states. The `approved`
/// value is reserved for the NSFW approval transition and rejected here, so the
/// status field alone can never claim a grant happened.
#[utoipa::path(
    put,
    path = "/api/admin/contacts/{id}/status",
    params(("id" = i64, Path, description = "Submission ID")),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Updated", body = Submission),
        (status = 400, description = "Illegal status value"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_submission_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<StatusUpdateRequest>,
) -> Result<Json<Submission>, ApiError> {
    if payload.status == SubmissionStatus::Approved {
        return Err(ApiError::Validation(
            "Status 'approved' is set by the NSFW approval action".to_string(),
        ));
    }
    match state.repo.set_status(id, payload.status).await? {
        Some(submission) => Ok(Json(submission)),
        None => Err(ApiError::NotFound("Contact")),
    }
}

/// approve_nsfw
///
/// [Admin Route] The one-shot approval transition. The repository write is a
/// compare-and-set conditioned on the record still being axis-B pending; when it
/// does not apply, the record is re-read so the admin is told *which*
/// precondition failed rather than a generic error. Of two concurrent attempts,
/// exactly one takes this path to success.
#[utoipa::path(
    post,
    path = "/api/admin/contacts/{id}/approve-nsfw",
    params(("id" = i64, Path, description = "Submission ID")),
    responses(
        (status = 200, description = "Approved", body = Submission),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Not in an approvable state")
    )
)]
pub async fn approve_nsfw(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Submission>, ApiError> {
    if let Some(submission) = state.repo.approve_nsfw(id).await? {
        dispatch(
            &state.notifier,
            NotifyEvent::NsfwApproved {
                name: format!("{} {}", submission.first_name, submission.last_name),
                email: submission.email.clone(),
            },
        );
        return Ok(Json(submission));
    }

    // The conditional update did not apply. Classify why for the caller.
    match state.repo.get(id).await? {
        None => Err(ApiError::NotFound("Contact")),
        Some(submission) => match approval::check_approvable(&submission) {
            Err(blocked) => Err(ApiError::Precondition(blocked.to_string())),
            // Still pending yet the write missed: the record changed between the
            // two reads. Report it as a transient failure.
            Ok(()) => {
                debug_assert_eq!(submission.nsfw_state(), NsfwState::Pending);
                Err(ApiError::Unavailable)
            }
        },
    }
}

/// get_admin_stats
///
/// [Admin Route] Dashboard counters.
#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses((status = 200, description = "Stats", body = DashboardStats))
)]
pub async fn get_admin_stats(
    State(state): State<AppState>,
) -> Result<Json<DashboardStats>, ApiError> {
    Ok(Json(state.repo.stats().await?))
}

// --- Members area & status ---

/// member_area
///
/// [Member Route] The unlocked members-area payload. The interesting part is the
/// guard in front of it; the body is just what the page renderer needs.
#[utoipa::path(
    get,
    path = "/nsfw",
    responses(
        (status = 200, description = "Members area", body = MemberArea),
        (status = 401, description = "No member session")
    )
)]
pub async fn member_area() -> Json<MemberArea> {
    Json(MemberArea {
        platforms: vec![
            PlatformLink {
                name: "OnlyFans".to_string(),
                url: "https://onlyfans.com/creator".to_string(),
                handle: "@creator".to_string(),
            },
            PlatformLink {
                name: "Twitter/X".to_string(),
                url: "https://x.com/creator".to_string(),
                handle: "@creator".to_string(),
            },
        ],
    })
}

/// api_status
///
/// [Public Route] Service and session summary for the front end and monitoring.
/// Works for anonymous callers; an attached identity only enriches the payload.
#[utoipa::path(
    get,
    path = "/api/status",
    responses((status = 200, description = "Service status", body = StatusResponse))
)]
pub async fn api_status(
    State(state): State<AppState>,
    MaybeIdentity(identity): MaybeIdentity,
) -> Json<StatusResponse> {
    Json(StatusResponse {
        service: "creator-portal".to_string(),
        env: format!("{:?}", state.config.env).to_lowercase(),
        session: SessionSummary {
            active: identity.is_some(),
            tier: identity.map(|id| id.tier.to_string()),
        },
    })
}

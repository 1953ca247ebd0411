use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Core Application Schemas (Mapped to Database) ---

/// SubmissionStatus
///
/// The visible workflow label an administrator moves a submission through.
/// `Approved` is special: it is never set directly through the status endpoint,
/// only as a side effect of the NSFW approval transition.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "submission_status", rename_all = "lowercase")]
#[ts(export)]
pub enum SubmissionStatus {
    #[default]
    New,
    Read,
    Replied,
    Approved,
    Archived,
}

/// Submission
///
/// A visitor contact-form submission from the `public.submissions` table.
/// This is the primary data structure for the approval lifecycle: the workflow
/// status (axis A) and the NSFW capability fields (axis B) live side by side,
/// and every mutation goes through the repository's defined transitions.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Submission {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub mobile_number: Option<String>,
    pub gender: Option<String>,

    /// Only consulted when the submission requested NSFW access; immutable after
    /// creation, which is why the approval transition does not re-check age.
    #[ts(type = "string | null")]
    pub birthday: Option<NaiveDate>,

    pub city: Option<String>,
    /// Maps SQL column "state" (US state, as the form labels it) to the neutral
    /// Rust field name "region".
    #[sqlx(rename = "state")]
    #[serde(rename = "state")]
    pub region: Option<String>,

    pub message: String,

    /// Ordered for display; semantically a set of category tags.
    pub interests: Vec<String>,

    // Axis B: the NSFW capability gate.
    // `has_nsfw_interest` is derived at creation from `interests` and never
    // client-settable; `nsfw_access_approved` flips true exactly once.
    pub has_nsfw_interest: bool,
    pub nsfw_access_approved: bool,

    // Axis A: the admin-driven workflow status.
    pub status: SubmissionStatus,

    pub sms_opt_in: bool,

    // Audit metadata captured at creation. Never used in authorization decisions.
    pub origin_ip: String,
    pub user_agent: String,

    // Lifecycle timestamps: each is stamped at most once, the first time the
    // corresponding event occurs, and never cleared.
    #[ts(type = "string")]
    pub submitted_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub read_at: Option<DateTime<Utc>>,
    #[ts(type = "string | null")]
    pub replied_at: Option<DateTime<Utc>>,
    #[ts(type = "string | null")]
    pub approved_at: Option<DateTime<Utc>>,
}

/// --- Request Payloads (Input Schemas) ---

/// CreateSubmissionRequest
///
/// Input payload for the public contact endpoint (POST /api/contact).
/// Required fields are plain types so a payload missing them is rejected at
/// deserialization, before any of it reaches the state machine.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateSubmissionRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub message: String,
    #[serde(default)]
    pub interests: Vec<String>,
    pub mobile_number: Option<String>,
    pub gender: Option<String>,
    /// Mandatory when `interests` contains the NSFW tag (age gate).
    #[ts(type = "string | null")]
    pub birthday: Option<NaiveDate>,
    pub city: Option<String>,
    #[serde(rename = "state")]
    pub region: Option<String>,
    #[serde(default)]
    pub sms_opt_in: bool,
}

/// NewSubmission
///
/// Internal structure handed to the repository after validation: the handler has
/// already derived `has_nsfw_interest` and captured the request metadata. This is
/// the only way a submission row comes into existence.
#[derive(Debug, Clone, Default)]
pub struct NewSubmission {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub mobile_number: Option<String>,
    pub gender: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub message: String,
    pub interests: Vec<String>,
    pub has_nsfw_interest: bool,
    pub sms_opt_in: bool,
    pub origin_ip: String,
    pub user_agent: String,
}

/// LoginRequest
///
/// Input payload for both tier login endpoints. `age_confirmed` is only consulted
/// by the member (NSFW) login; the admin login ignores it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub password: String,
    #[serde(default)]
    pub age_confirmed: bool,
}

/// StatusUpdateRequest
///
/// Input payload for the admin workflow-status endpoint
/// (PUT /api/admin/contacts/{id}/status).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct StatusUpdateRequest {
    pub status: SubmissionStatus,
}

/// --- Dashboard & Status Schemas (Output) ---

/// DashboardStats
///
/// Output schema for the administrative statistics endpoint (GET /api/admin/stats).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct DashboardStats {
    pub total_contacts: i64,
    /// Submissions whose interests included the NSFW tag.
    pub nsfw_requests: i64,
    /// Submissions still in `new` status.
    pub unread: i64,
    /// NSFW requests not yet granted (axis B `pending`).
    pub pending_nsfw: i64,
}

/// SessionSummary
///
/// The session half of the public status endpoint payload.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SessionSummary {
    pub active: bool,
    /// "member" or "administrator" when a session is attached.
    pub tier: Option<String>,
}

/// StatusResponse
///
/// Output schema for GET /api/status: a small infrastructure and session summary
/// used by the front end and by monitoring.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct StatusResponse {
    pub service: String,
    pub env: String,
    pub session: SessionSummary,
}

/// MemberArea
///
/// Output schema for the guarded members endpoint (GET /nsfw): the data the page
/// renderer needs for the unlocked area. Rendering itself is out of scope; the
/// guard on this payload is the point.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MemberArea {
    pub platforms: Vec<PlatformLink>,
}

/// PlatformLink
///
/// One external platform entry in the members area.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PlatformLink {
    pub name: String,
    pub url: String,
    pub handle: String,
}

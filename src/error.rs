use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// ApiError
///
/// The application-wide error taxonomy. Every fallible handler returns
/// `Result<_, ApiError>`, and the `IntoResponse` implementation below is the single
/// place where error classes are mapped to HTTP status codes and client-visible
/// messages.
///
/// Messaging policy:
/// - Validation and precondition failures carry a *specific* reason so the admin UI
///   and the contact form can render an accurate message.
/// - Authentication failures are *generic* ("Invalid password."): with shared
///   passwords there are no accounts to enumerate, and we still avoid hinting.
/// - Store failures are generic to the client; the detail lives in the logs only.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed or disallowed client input (missing birthday, underage NSFW request,
    /// illegal status value). 400.
    Validation(String),
    /// Wrong shared secret. Deliberately message-free beyond the generic text. 401.
    Auth,
    /// Login throttle tripped for this client. 429.
    TooManyAttempts,
    /// The target record does not exist. 404.
    NotFound(&'static str),
    /// The record is not in the state the requested transition needs. The message
    /// names the blocking state. 409.
    Precondition(String),
    /// A backing store failed. The operation is reported as failed (fail closed)
    /// without leaking internals. 500.
    Unavailable,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Validation(reason) => write!(f, "{reason}"),
            ApiError::Auth => write!(f, "Invalid password."),
            ApiError::TooManyAttempts => write!(f, "Too many login attempts. Try again later."),
            ApiError::NotFound(what) => write!(f, "{what} not found"),
            ApiError::Precondition(reason) => write!(f, "{reason}"),
            ApiError::Unavailable => write!(f, "Service temporarily unavailable. Please try again."),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth => StatusCode::UNAUTHORIZED,
            ApiError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Precondition(_) => StatusCode::CONFLICT,
            ApiError::Unavailable => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// StoreError
///
/// Opaque failure from a backing store (Postgres, session store). The message is
/// for logs; converting into `ApiError` always collapses to the generic
/// `Unavailable` so internal detail never reaches the client.
#[derive(Debug, Clone)]
pub struct StoreError(pub String);

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store error: {}", self.0)
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(_: StoreError) -> Self {
        // The repository/session layers have already logged the specific failure.
        ApiError::Unavailable
    }
}

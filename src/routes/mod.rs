/// Router Module Index
///
/// Organizes the application's routing logic into security-segregated modules.
/// Access control is applied explicitly at the module level (via Axum layers in
/// `create_router`), so a route cannot end up protected by accident of handler
/// internals, or unprotected by accident of omission.
///
/// The three modules map directly to the identity tiers.

/// Routes accessible to everyone: health, status, the contact form, and the
/// login/logout endpoints for both tiers.
pub mod public;

/// Routes behind the member-tier guard (the NSFW area).
pub mod member;

/// Routes behind the administrator-tier guard (submission management).
pub mod admin;

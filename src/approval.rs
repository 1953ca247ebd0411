//! The approval state machine: age eligibility at submission time and the
//! one-way NSFW capability grant.
//!
//! Two independent state axes interact on a submission. Axis A is the visible
//! workflow status (`new -> read -> replied`, any -> `archived`), free-form and
//! admin-driven. Axis B is the NSFW capability, a strict one-way gate modeled
//! here as [`NsfwState`]. The `approved` status value belongs to axis A but is
//! only ever produced as a side effect of the axis-B grant.

use chrono::{Datelike, NaiveDate};
use std::fmt;

use crate::models::{CreateSubmissionRequest, Submission};

/// The interest tag whose presence marks a submission as an NSFW access request.
pub const NSFW_TAG: &str = "NSFW";

/// Minimum computed age for a submission that requests NSFW access.
pub const MIN_NSFW_AGE: i32 = 18;

/// NsfwState
///
/// The axis-B capability state, derived from the two persisted fields rather than
/// stored as its own column. Deriving it in one place means every transition
/// decision sees the same tagged state and illegal field combinations cannot be
/// produced by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NsfwState {
    /// The submission never asked for NSFW access; no approval action is valid.
    Unrequested,
    /// Asked and not yet granted; the only valid action is approval.
    Pending,
    /// Granted. Terminal: there is no revocation transition.
    Granted,
}

impl fmt::Display for NsfwState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NsfwState::Unrequested => "unrequested",
            NsfwState::Pending => "pending",
            NsfwState::Granted => "granted",
        };
        f.write_str(s)
    }
}

impl Submission {
    /// The derived axis-B state of this record.
    pub fn nsfw_state(&self) -> NsfwState {
        match (self.has_nsfw_interest, self.nsfw_access_approved) {
            (false, _) => NsfwState::Unrequested,
            (true, false) => NsfwState::Pending,
            (true, true) => NsfwState::Granted,
        }
    }
}

/// AgeGateError
///
/// Rejections from the creation-time age gate. These are expected client errors,
/// not exceptional conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeGateError {
    /// NSFW access was requested without supplying a birthday.
    BirthdayRequired,
    /// The computed age is below [`MIN_NSFW_AGE`].
    Underage,
}

impl fmt::Display for AgeGateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgeGateError::BirthdayRequired => {
                f.write_str("Birthday is required for NSFW access")
            }
            AgeGateError::Underage => {
                write!(f, "You must be {MIN_NSFW_AGE}+ to request NSFW access")
            }
        }
    }
}

/// compute_age
///
/// Whole years between `birthday` and `today`: the year difference, minus one if
/// today's (month, day) precedes the birthday's (month, day) lexicographically.
/// The lexicographic comparison handles leap-year birthdates and the same-day
/// boundary without any calendar arithmetic.
pub fn compute_age(birthday: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birthday.year();
    if (today.month(), today.day()) < (birthday.month(), birthday.day()) {
        age -= 1;
    }
    age
}

/// requests_nsfw
///
/// Whether an interest list constitutes an NSFW access request. This is the single
/// definition `has_nsfw_interest` is derived from; the client cannot set the flag
/// any other way.
pub fn requests_nsfw(interests: &[String]) -> bool {
    interests.iter().any(|tag| tag == NSFW_TAG)
}

/// validate_age_gate
///
/// The first of the two age-trust boundaries: run before a submission record is
/// persisted. Returns the derived NSFW-interest flag on success. Submissions that
/// do not request NSFW access pass unconditionally; the gate only applies to the
/// capability request, not to contact in general.
pub fn validate_age_gate(
    req: &CreateSubmissionRequest,
    today: NaiveDate,
) -> Result<bool, AgeGateError> {
    if !requests_nsfw(&req.interests) {
        return Ok(false);
    }
    let birthday = req.birthday.ok_or(AgeGateError::BirthdayRequired)?;
    if compute_age(birthday, today) < MIN_NSFW_AGE {
        return Err(AgeGateError::Underage);
    }
    Ok(true)
}

/// ApprovalBlocked
///
/// Why an approval attempt cannot proceed. The second age-trust boundary lives
/// here implicitly: approval requires axis B to be exactly `Pending`, and a
/// `Pending` record already passed the creation-time age gate (the birthday is
/// immutable), so age is not re-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalBlocked {
    /// `hasNsfwInterest` is false: nothing was requested, nothing to grant.
    Unrequested,
    /// Already granted; the grant is one-shot and terminal.
    AlreadyGranted,
}

impl fmt::Display for ApprovalBlocked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalBlocked::Unrequested => {
                f.write_str("This contact did not request NSFW access")
            }
            ApprovalBlocked::AlreadyGranted => f.write_str("NSFW access already approved"),
        }
    }
}

/// check_approvable
///
/// Precondition check for the approval transition. Callers must surface the
/// specific blocked state to the admin UI rather than a generic failure.
pub fn check_approvable(submission: &Submission) -> Result<(), ApprovalBlocked> {
    match submission.nsfw_state() {
        NsfwState::Pending => Ok(()),
        NsfwState::Unrequested => Err(ApprovalBlocked::Unrequested),
        NsfwState::Granted => Err(ApprovalBlocked::AlreadyGranted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn age_counts_whole_years() {
        let today = date(2026, 8, 7);
        assert_eq!(compute_age(date(2000, 8, 7), today), 26);
        assert_eq!(compute_age(date(2000, 8, 8), today), 25);
        assert_eq!(compute_age(date(2000, 8, 6), today), 26);
    }

    #[test]
    fn age_is_exact_on_eighteenth_birthday() {
        let today = date(2026, 8, 7);
        assert_eq!(compute_age(date(2008, 8, 7), today), 18);
        assert_eq!(compute_age(date(2008, 8, 8), today), 17);
    }

    #[test]
    fn age_handles_leap_day_birthdays() {
        // Feb 29 birthday, checked in a non-leap year: (2,29) > (3,1) is false,
        // so the year has ticked over by March 1 but not on Feb 28.
        let leap_birthday = date(2008, 2, 29);
        assert_eq!(compute_age(leap_birthday, date(2026, 2, 28)), 17);
        assert_eq!(compute_age(leap_birthday, date(2026, 3, 1)), 18);
    }

    #[test]
    fn nsfw_flag_derived_only_from_tag_presence() {
        assert!(requests_nsfw(&["Gaming".into(), "NSFW".into()]));
        assert!(!requests_nsfw(&["Gaming".into(), "Vlogs".into()]));
        // Case-sensitive: the tag is a fixed vocabulary entry, not free text.
        assert!(!requests_nsfw(&["nsfw".into()]));
        assert!(!requests_nsfw(&[]));
    }

    #[test]
    fn gate_ignores_age_without_nsfw_request() {
        let req = CreateSubmissionRequest {
            interests: vec!["Gaming".into()],
            birthday: Some(date(2021, 1, 1)),
            ..Default::default()
        };
        assert_eq!(validate_age_gate(&req, date(2026, 8, 7)), Ok(false));

        // No birthday at all is also fine when NSFW was not requested.
        let req = CreateSubmissionRequest {
            interests: vec!["Gaming".into()],
            ..Default::default()
        };
        assert_eq!(validate_age_gate(&req, date(2026, 8, 7)), Ok(false));
    }

    #[test]
    fn gate_requires_birthday_for_nsfw() {
        let req = CreateSubmissionRequest {
            interests: vec!["NSFW".into()],
            ..Default::default()
        };
        assert_eq!(
            validate_age_gate(&req, date(2026, 8, 7)),
            Err(AgeGateError::BirthdayRequired)
        );
    }

    #[test]
    fn gate_enforces_minimum_age_boundary() {
        let today = date(2026, 8, 7);
        let at_boundary = CreateSubmissionRequest {
            interests: vec!["NSFW".into()],
            birthday: Some(date(2008, 8, 7)),
            ..Default::default()
        };
        assert_eq!(validate_age_gate(&at_boundary, today), Ok(true));

        let one_day_short = CreateSubmissionRequest {
            interests: vec!["NSFW".into()],
            birthday: Some(date(2008, 8, 8)),
            ..Default::default()
        };
        assert_eq!(
            validate_age_gate(&one_day_short, today),
            Err(AgeGateError::Underage)
        );
    }

    #[test]
    fn nsfw_state_derivation() {
        let mut sub = Submission::default();
        assert_eq!(sub.nsfw_state(), NsfwState::Unrequested);

        sub.has_nsfw_interest = true;
        assert_eq!(sub.nsfw_state(), NsfwState::Pending);

        sub.nsfw_access_approved = true;
        assert_eq!(sub.nsfw_state(), NsfwState::Granted);
    }

    #[test]
    fn approvable_only_when_pending() {
        let mut sub = Submission::default();
        assert_eq!(check_approvable(&sub), Err(ApprovalBlocked::Unrequested));

        sub.has_nsfw_interest = true;
        assert_eq!(check_approvable(&sub), Ok(()));

        sub.nsfw_access_approved = true;
        assert_eq!(check_approvable(&sub), Err(ApprovalBlocked::AlreadyGranted));
    }
}

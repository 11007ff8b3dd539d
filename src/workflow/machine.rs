//! Issue lifecycle state machine.
//!
//! The transition table is static; every committed status change must be a
//! pair listed here.

use crate::error::{AppError, Result};
use crate::models::IssueStatus;

/// Targets reachable from a given status. Terminal states return an empty
/// slice.
pub fn allowed_transitions(from: IssueStatus) -> &'static [IssueStatus] {
    use IssueStatus::*;
    match from {
        New => &[Triage, Rejected],
        Triage => &[Assigned, Rejected],
        Assigned => &[InProgress],
        InProgress => &[Fixed],
        Fixed => &[RegressionTracking],
        RegressionTracking => &[Closed, Reopened],
        Reopened => &[InProgress],
        Closed => &[],
        Rejected => &[],
    }
}

/// Validate a single lifecycle transition. Fails if `from` is terminal or
/// `to` is not in `from`'s allowed set; the error carries the full allowed
/// set for `from`.
pub fn validate_transition(from: IssueStatus, to: IssueStatus) -> Result<()> {
    let allowed = allowed_transitions(from);
    if allowed.contains(&to) {
        Ok(())
    } else {
        Err(AppError::InvalidTransition {
            from,
            to,
            allowed: allowed.to_vec(),
        })
    }
}

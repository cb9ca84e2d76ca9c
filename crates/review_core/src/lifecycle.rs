//! crates/review_core/src/lifecycle.rs
//!
//! The request state machine. A request is `Created` until a single batch
//! review stamps it `Reviewed`; there is no way back. The state is derived
//! from `reviewed_at` and never stored on its own.

use crate::domain::{Highlight, ReviewDecision, ReviewRequest, Role};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestState {
    Created,
    Reviewed,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LifecycleError {
    #[error("request {0} has already been reviewed")]
    AlreadyReviewed(Uuid),
    #[error("invalid review: {}", .0.join("; "))]
    InvalidDecisions(Vec<String>),
}

/// A validated batch review, ready to be applied atomically.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewPlan {
    pub request_id: Uuid,
    /// Written to the request and to every decided highlight.
    pub reviewed_at: DateTime<Utc>,
    pub decisions: Vec<ReviewDecision>,
}

pub fn state_of(request: &ReviewRequest) -> RequestState {
    match request.reviewed_at {
        Some(_) => RequestState::Reviewed,
        None => RequestState::Created,
    }
}

pub fn ensure_reviewable(request: &ReviewRequest) -> Result<(), LifecycleError> {
    match state_of(request) {
        RequestState::Created => Ok(()),
        RequestState::Reviewed => Err(LifecycleError::AlreadyReviewed(request.id)),
    }
}

/// Checks a batch of decisions against the request's highlights.
///
/// Every owned highlight must receive exactly one decision and no decision may
/// name a highlight of another request.
pub fn plan_review(
    request: &ReviewRequest,
    highlights: &[Highlight],
    decisions: Vec<ReviewDecision>,
    now: DateTime<Utc>,
) -> Result<ReviewPlan, LifecycleError> {
    ensure_reviewable(request)?;

    let owned: HashSet<Uuid> = highlights
        .iter()
        .filter(|h| h.request_id == request.id)
        .map(|h| h.id)
        .collect();

    let mut problems = Vec::new();
    let mut seen = HashSet::new();
    for decision in &decisions {
        if !owned.contains(&decision.highlight_id) {
            problems.push(format!(
                "highlight {} does not belong to request {}",
                decision.highlight_id, request.id
            ));
        } else if !seen.insert(decision.highlight_id) {
            problems.push(format!(
                "highlight {} has more than one decision",
                decision.highlight_id
            ));
        }
    }
    for highlight in highlights.iter().filter(|h| !seen.contains(&h.id)) {
        problems.push(format!("highlight {} has no decision", highlight.id));
    }

    if !problems.is_empty() {
        return Err(LifecycleError::InvalidDecisions(problems));
    }

    Ok(ReviewPlan {
        request_id: request.id,
        reviewed_at: now,
        decisions,
    })
}

/// Infers which party `email` is acting as on `request`, if any.
pub fn acting_role(request: &ReviewRequest, email: &str) -> Option<Role> {
    if email == request.approver_email {
        Some(Role::Approver)
    } else if email == request.requester_email {
        Some(Role::Requester)
    } else {
        None
    }
}

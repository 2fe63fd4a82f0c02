//! Window and status arithmetic for assignments.
//!
//! A window is the half-open interval `[start, end)`, unbounded above when
//! `end` is absent. Everything in here is a pure function of its arguments.

use std::cmp::Ordering;

use time::OffsetDateTime;

use crate::error::{AppError, Result};
use crate::models::assignment::{Assignment, AssignmentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: OffsetDateTime,
    pub end: Option<OffsetDateTime>,
}

impl Window {
    /// Rejects windows whose end is not strictly after their start.
    pub fn validate(&self) -> Result<()> {
        match self.end {
            Some(end) if end <= self.start => Err(AppError::BadRequest(
                "ends_at must be after starts_at".into(),
            )),
            _ => Ok(()),
        }
    }

    pub fn contains(&self, at: OffsetDateTime) -> bool {
        at >= self.start && self.end.map_or(true, |end| at < end)
    }

    pub fn has_ended(&self, at: OffsetDateTime) -> bool {
        self.end.is_some_and(|end| at >= end)
    }
}

/// Status of a window at `now`, ignoring whatever is stored.
pub fn derive_status(window: Window, now: OffsetDateTime) -> AssignmentStatus {
    if now < window.start {
        AssignmentStatus::Planned
    } else if window.has_ended(now) {
        AssignmentStatus::Completed
    } else {
        AssignmentStatus::Active
    }
}

/// Status reported to clients: a stored `archived` is an administrative
/// override and always wins; any other stored value yields to the window.
pub fn effective_status(
    stored: AssignmentStatus,
    window: Window,
    now: OffsetDateTime,
) -> AssignmentStatus {
    match stored {
        AssignmentStatus::Archived => AssignmentStatus::Archived,
        _ => derive_status(window, now),
    }
}

/// Deterministic precedence among candidates for "current":
/// earliest start, then earliest creation, then lowest id.
fn current_precedence(a: &Assignment, b: &Assignment) -> Ordering {
    a.starts_at
        .cmp(&b.starts_at)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn is_current(a: &Assignment, now: OffsetDateTime) -> bool {
    a.status != AssignmentStatus::Archived && a.window().contains(now)
}

/// Picks the single current assignment out of a user's assignments.
pub fn pick_current(assignments: &[Assignment], now: OffsetDateTime) -> Option<&Assignment> {
    assignments
        .iter()
        .filter(|a| is_current(a, now))
        .min_by(|a, b| current_precedence(a, b))
}

/// Whether an assignment belongs in a user's history: archived, or its
/// window ended in the past. A stored `completed` on a running window yields
/// to the window like any other non-archived value.
pub fn is_history(a: &Assignment, now: OffsetDateTime) -> bool {
    matches!(
        a.effective_status(now),
        AssignmentStatus::Completed | AssignmentStatus::Archived
    )
}

/// History for one user: everything that qualifies except the current
/// assignment, newest start first, at most `limit` entries.
pub fn select_history(assignments: &[Assignment], now: OffsetDateTime, limit: usize) -> Vec<Assignment> {
    let current_id = pick_current(assignments, now).map(|a| a.id);
    let mut history: Vec<Assignment> = assignments
        .iter()
        .filter(|a| Some(a.id) != current_id && is_history(a, now))
        .cloned()
        .collect();
    history.sort_by(|a, b| b.starts_at.cmp(&a.starts_at).then_with(|| b.id.cmp(&a.id)));
    history.truncate(limit);
    history
}

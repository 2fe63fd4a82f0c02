use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::lifecycle::status::{self, Window};
use crate::models::{user::UserSummary, workplace::WorkplaceSummary};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "assignment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Planned,
    Active,
    Completed,
    Archived,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Planned => "planned",
            AssignmentStatus::Active => "active",
            AssignmentStatus::Completed => "completed",
            AssignmentStatus::Archived => "archived",
        }
    }
}

/// A user placed at a workplace for the window `[starts_at, ends_at)`.
///
/// `status` is the stored hint. What clients see is [`Assignment::effective_status`].
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Assignment {
    pub id: Uuid,
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub workplace_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub ends_at: Option<OffsetDateTime>,
    pub status: AssignmentStatus,
    pub created_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Assignment {
    pub fn window(&self) -> Window {
        Window {
            start: self.starts_at,
            end: self.ends_at,
        }
    }

    pub fn effective_status(&self, now: OffsetDateTime) -> AssignmentStatus {
        status::effective_status(self.status, self.window(), now)
    }
}

/// Assignment enriched with its user and workplace, status resolved at read time.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentView {
    pub id: Uuid,
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub workplace_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub ends_at: Option<OffsetDateTime>,
    pub status: AssignmentStatus,
    pub stored_status: AssignmentStatus,
    pub created_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub user: UserSummary,
    pub workplace: WorkplaceSummary,
}

impl AssignmentView {
    pub fn new(
        a: &Assignment,
        user: UserSummary,
        workplace: WorkplaceSummary,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id: a.id,
            org_id: a.org_id,
            user_id: a.user_id,
            workplace_id: a.workplace_id,
            starts_at: a.starts_at,
            ends_at: a.ends_at,
            status: a.effective_status(now),
            stored_status: a.status,
            created_by: a.created_by,
            created_at: a.created_at,
            updated_at: a.updated_at,
            user,
            workplace,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAssignmentRequest {
    /// Defaults to the caller's organization.
    pub org_id: Option<Uuid>,
    pub user_id: Uuid,
    pub workplace_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub ends_at: Option<OffsetDateTime>,
    pub status: Option<AssignmentStatus>,
}

/// Partial update. `ends_at: null` clears the end (open-ended window);
/// omitting it leaves the end untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAssignmentRequest {
    pub workplace_id: Option<Uuid>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub starts_at: Option<OffsetDateTime>,
    #[serde(default, deserialize_with = "nullable_rfc3339")]
    pub ends_at: Option<Option<OffsetDateTime>>,
    pub status: Option<AssignmentStatus>,
}

fn nullable_rfc3339<'de, D>(deserializer: D) -> Result<Option<Option<OffsetDateTime>>, D::Error>
where
    D: Deserializer<'de>,
{
    time::serde::rfc3339::option::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct AssignmentListParams {
    pub user_id: Option<Uuid>,
    pub workplace_id: Option<Uuid>,
    pub status: Option<AssignmentStatus>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub from: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub to: Option<OffsetDateTime>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Storage-level assignment filter.
///
/// `status` is matched against the effective status at `now`, so the store
/// translates it into window predicates instead of comparing the column.
/// `from`/`to` select windows overlapping `[from, to]`.
#[derive(Debug, Clone)]
pub struct AssignmentFilter {
    pub org_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub workplace_id: Option<Uuid>,
    pub status: Option<AssignmentStatus>,
    pub now: OffsetDateTime,
    pub from: Option<OffsetDateTime>,
    pub to: Option<OffsetDateTime>,
    pub limit: i64,
    pub offset: i64,
}

impl AssignmentFilter {
    /// In-process evaluation of the filter predicates (pagination excluded).
    pub fn matches(&self, a: &Assignment) -> bool {
        if self.org_id.is_some_and(|id| id != a.org_id)
            || self.user_id.is_some_and(|id| id != a.user_id)
            || self.workplace_id.is_some_and(|id| id != a.workplace_id)
        {
            return false;
        }
        if let Some(wanted) = self.status {
            if a.effective_status(self.now) != wanted {
                return false;
            }
        }
        if let Some(to) = self.to {
            if a.starts_at > to {
                return false;
            }
        }
        if let Some(from) = self.from {
            if a.ends_at.is_some_and(|end| end <= from) {
                return false;
            }
        }
        true
    }
}

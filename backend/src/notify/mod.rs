//! Notification emitter.
//!
//! The lifecycle service calls into this after an assignment mutation has
//! been persisted. Delivery is best-effort: the assignment change stands even
//! when a notification cannot be written.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::{
    assignment::AssignmentView,
    notification::{Notification, NotificationKind, NotificationPayload},
};
use crate::store::{DynStore, StoreResult};

#[async_trait]
pub trait NotificationEmitter: Send + Sync + 'static {
    /// Persists one notification about `assignment` addressed to `recipient_id`.
    async fn notify(
        &self,
        recipient_id: Uuid,
        assignment: &AssignmentView,
        kind: NotificationKind,
        at: OffsetDateTime,
    ) -> StoreResult<Notification>;
}

/// Who, besides the assignee, hears about assignment changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecipientPolicy {
    pub actor: bool,
    pub org_admins: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecipientPolicyError {
    #[error("unknown notification recipient '{0}'")]
    UnknownRecipient(String),
}

impl FromStr for RecipientPolicy {
    type Err = RecipientPolicyError;

    /// Comma separated list of `assignee`, `actor`, `org_admins`. The assignee
    /// is always notified, so `assignee` is accepted but changes nothing.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut policy = RecipientPolicy::default();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.to_ascii_lowercase().as_str() {
                "assignee" => {}
                "actor" => policy.actor = true,
                "org_admins" => policy.org_admins = true,
                other => return Err(RecipientPolicyError::UnknownRecipient(other.to_string())),
            }
        }
        Ok(policy)
    }
}

/// Writes notifications through the store, with a message rendered in the
/// organization's timezone.
pub struct StoreNotifier {
    store: DynStore,
}

impl StoreNotifier {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    async fn timezone(&self, org_id: Uuid) -> chrono_tz::Tz {
        match self.store.find_organization(org_id).await {
            Ok(Some(org)) => org.tz(),
            Ok(None) => chrono_tz::UTC,
            Err(e) => {
                tracing::debug!(%org_id, error = %e, "timezone lookup failed, using UTC");
                chrono_tz::UTC
            }
        }
    }
}

#[async_trait]
impl NotificationEmitter for StoreNotifier {
    async fn notify(
        &self,
        recipient_id: Uuid,
        assignment: &AssignmentView,
        kind: NotificationKind,
        at: OffsetDateTime,
    ) -> StoreResult<Notification> {
        let tz = self.timezone(assignment.org_id).await;
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: recipient_id,
            assignment_id: Some(assignment.id),
            kind,
            message: render_message(kind, assignment, tz),
            payload: Json(payload_for(assignment)),
            created_at: at,
            read_at: None,
        };
        self.store.insert_notification(&notification).await
    }
}

pub fn payload_for(assignment: &AssignmentView) -> NotificationPayload {
    NotificationPayload {
        assignment_id: assignment.id,
        workplace_id: assignment.workplace.id,
        workplace_code: assignment.workplace.code.clone(),
        workplace_name: assignment.workplace.name.clone(),
        starts_at: assignment.starts_at,
        ends_at: assignment.ends_at,
        status: assignment.status,
    }
}

fn local_time(at: OffsetDateTime, tz: chrono_tz::Tz) -> String {
    match chrono::DateTime::from_timestamp(at.unix_timestamp(), 0) {
        Some(utc) => utc.with_timezone(&tz).format("%Y-%m-%d %H:%M %Z").to_string(),
        None => at.to_string(),
    }
}

pub fn render_message(kind: NotificationKind, a: &AssignmentView, tz: chrono_tz::Tz) -> String {
    let verb = match kind {
        NotificationKind::AssignmentCreated => "Assigned to",
        NotificationKind::AssignmentUpdated => "Assignment updated:",
    };
    let window = match a.ends_at {
        Some(end) => format!("{} until {}", local_time(a.starts_at, tz), local_time(end, tz)),
        None => format!("from {}", local_time(a.starts_at, tz)),
    };
    format!(
        "{} {} ({}), {} [{}]",
        verb,
        a.workplace.name,
        a.workplace.code,
        window,
        a.status.as_str()
    )
}

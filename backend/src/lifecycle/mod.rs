//! Assignment lifecycle: creation, reassignment, removal and the read-side
//! "where does this person sit right now" view.
//!
//! Each operation reads the clock exactly once. Status is never cached; it
//! is derived from that instant whenever a record is turned into a view.

pub mod status;

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::clock::Clock;
use crate::error::{AppError, Result};
use crate::models::{
    assignment::{
        Assignment, AssignmentFilter, AssignmentListParams, AssignmentView,
        CreateAssignmentRequest, UpdateAssignmentRequest,
    },
    common::{Page, PageParams},
    notification::NotificationKind,
    user::{CurrentWorkplaceResponse, UserSummary},
    workplace::WorkplaceSummary,
};
use crate::notify::{NotificationEmitter, RecipientPolicy};
use crate::org_guard;
use crate::store::{DynStore, StoreError};

use self::status::{derive_status, pick_current, select_history, Window};

pub const DEFAULT_HISTORY_LIMIT: i64 = 10;
pub const MAX_HISTORY_LIMIT: i64 = 50;

/// Delete rounds before giving up on an assignment that keeps gaining notifications.
const REMOVE_ATTEMPTS: usize = 2;

pub struct AssignmentService {
    store: DynStore,
    emitter: Arc<dyn NotificationEmitter>,
    recipients: RecipientPolicy,
    clock: Arc<dyn Clock>,
}

impl AssignmentService {
    pub fn new(
        store: DynStore,
        emitter: Arc<dyn NotificationEmitter>,
        recipients: RecipientPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            emitter,
            recipients,
            clock,
        }
    }

    pub async fn create(&self, auth: &AuthUser, req: CreateAssignmentRequest) -> Result<AssignmentView> {
        let now = self.clock.now();
        let window = Window {
            start: req.starts_at,
            end: req.ends_at,
        };
        window.validate()?;

        let org_id = req.org_id.unwrap_or(auth.org_id);
        if !auth.can_access_org(org_id) {
            return Err(AppError::NotFound("Organization not found".into()));
        }
        let user = org_guard::verify_user(&*self.store, req.user_id, org_id).await?;
        let workplace = org_guard::verify_workplace(&*self.store, req.workplace_id, org_id).await?;

        let assignment = Assignment {
            id: Uuid::new_v4(),
            org_id,
            user_id: user.id,
            workplace_id: workplace.id,
            starts_at: window.start,
            ends_at: window.end,
            status: req.status.unwrap_or_else(|| derive_status(window, now)),
            created_by: Some(auth.id),
            created_at: now,
            updated_at: now,
        };
        let stored = self.store.insert_assignment(&assignment).await?;
        let view = AssignmentView::new(&stored, (&user).into(), (&workplace).into(), now);

        tracing::info!(
            assignment_id = %view.id,
            user_id = %view.user_id,
            workplace = %workplace.code,
            status = view.status.as_str(),
            "assignment created"
        );
        self.emit(auth, &view, NotificationKind::AssignmentCreated, now).await;

        Ok(view)
    }

    pub async fn update(
        &self,
        auth: &AuthUser,
        id: Uuid,
        patch: UpdateAssignmentRequest,
    ) -> Result<AssignmentView> {
        let now = self.clock.now();
        let existing = org_guard::verify_assignment(&*self.store, id, auth).await?;

        let merged = Assignment {
            workplace_id: patch.workplace_id.unwrap_or(existing.workplace_id),
            starts_at: patch.starts_at.unwrap_or(existing.starts_at),
            ends_at: patch.ends_at.unwrap_or(existing.ends_at),
            status: patch.status.unwrap_or(existing.status),
            updated_at: now,
            ..existing.clone()
        };
        merged.window().validate()?;

        let workplace =
            org_guard::verify_workplace(&*self.store, merged.workplace_id, existing.org_id).await?;
        let user = self
            .store
            .find_user(existing.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        // A concurrent delete may win between the read above and this write
        let updated = self
            .store
            .update_assignment(&merged)
            .await?
            .ok_or_else(|| AppError::NotFound("Assignment not found".into()))?;
        let view = AssignmentView::new(&updated, (&user).into(), (&workplace).into(), now);

        let reassigned = existing.workplace_id != updated.workplace_id;
        let status_changed = existing.status != updated.status;
        tracing::info!(
            assignment_id = %id,
            reassigned,
            status_changed,
            "assignment updated"
        );
        if reassigned || status_changed {
            self.emit(auth, &view, NotificationKind::AssignmentUpdated, now).await;
        }

        Ok(view)
    }

    /// Deletes the assignment after its notifications, so none is ever left
    /// pointing at a missing row.
    pub async fn remove(&self, auth: &AuthUser, id: Uuid) -> Result<()> {
        org_guard::verify_assignment(&*self.store, id, auth).await?;

        let mut notifications = 0;
        for attempt in 1..=REMOVE_ATTEMPTS {
            notifications += self.store.delete_notifications_for_assignment(id).await?;
            match self.store.delete_assignment(id).await {
                Ok(true) => {
                    tracing::info!(assignment_id = %id, notifications, "assignment removed");
                    return Ok(());
                }
                Ok(false) => return Err(AppError::NotFound("Assignment not found".into())),
                // A notification written between the two deletes still references the row
                Err(StoreError::MissingReference(detail)) => {
                    tracing::warn!(
                        assignment_id = %id,
                        attempt,
                        %detail,
                        "assignment gained notifications during removal"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Conflict(
            "Assignment received new notifications while being removed, retry the removal".into(),
        ))
    }

    pub async fn get(&self, auth: &AuthUser, id: Uuid) -> Result<AssignmentView> {
        let now = self.clock.now();
        let assignment = org_guard::verify_assignment(&*self.store, id, auth).await?;
        let mut views = self.views(vec![assignment], now).await?;
        views
            .pop()
            .ok_or_else(|| AppError::NotFound("Assignment not found".into()))
    }

    pub async fn list(&self, auth: &AuthUser, params: AssignmentListParams) -> Result<Page<AssignmentView>> {
        if let (Some(from), Some(to)) = (params.from, params.to) {
            if to < from {
                return Err(AppError::BadRequest("to must not be before from".into()));
            }
        }
        let page = PageParams {
            page: params.page,
            page_size: params.page_size,
        }
        .resolve()?;

        let now = self.clock.now();
        let filter = AssignmentFilter {
            org_id: (!auth.role.is_super_admin()).then_some(auth.org_id),
            user_id: params.user_id,
            workplace_id: params.workplace_id,
            status: params.status,
            now,
            from: params.from,
            to: params.to,
            limit: page.limit(),
            offset: page.offset(),
        };
        let (rows, total) = self.store.list_assignments(&filter).await?;
        let views = self.views(rows, now).await?;

        Ok(Page::new(views, total, page))
    }

    /// The single assignment whose window contains now, if any.
    pub async fn current_for_user(&self, auth: &AuthUser, user_id: Uuid) -> Result<Option<AssignmentView>> {
        let now = self.clock.now();
        org_guard::visible_user(&*self.store, user_id, auth).await?;

        let all = self.store.assignments_for_user(user_id).await?;
        let current: Vec<Assignment> = pick_current(&all, now).cloned().into_iter().collect();
        Ok(self.views(current, now).await?.pop())
    }

    /// Past and closed assignments, newest start first, never including the current one.
    pub async fn history_for_user(
        &self,
        auth: &AuthUser,
        user_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<AssignmentView>> {
        let now = self.clock.now();
        org_guard::visible_user(&*self.store, user_id, auth).await?;

        let all = self.store.assignments_for_user(user_id).await?;
        let history = select_history(&all, now, history_limit(limit));
        self.views(history, now).await
    }

    /// Current workplace, current assignment and recent history from one
    /// snapshot of the user's assignments.
    pub async fn current_workplace(
        &self,
        auth: &AuthUser,
        user_id: Uuid,
        limit: Option<i64>,
    ) -> Result<CurrentWorkplaceResponse> {
        let now = self.clock.now();
        org_guard::visible_user(&*self.store, user_id, auth).await?;

        let all = self.store.assignments_for_user(user_id).await?;
        let current: Vec<Assignment> = pick_current(&all, now).cloned().into_iter().collect();
        let assignment = self.views(current, now).await?.pop();
        let history = self
            .views(select_history(&all, now, history_limit(limit)), now)
            .await?;

        Ok(CurrentWorkplaceResponse {
            workplace: assignment.as_ref().map(|a| a.workplace.clone()),
            assignment,
            history,
        })
    }

    /// Enriches records with their user and workplace, resolving status at `now`.
    async fn views(&self, rows: Vec<Assignment>, now: OffsetDateTime) -> Result<Vec<AssignmentView>> {
        let mut users: HashMap<Uuid, UserSummary> = HashMap::new();
        let mut workplaces: HashMap<Uuid, WorkplaceSummary> = HashMap::new();
        let mut views = Vec::with_capacity(rows.len());

        for a in rows {
            if !users.contains_key(&a.user_id) {
                let user = self
                    .store
                    .find_user(a.user_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("User not found".into()))?;
                users.insert(a.user_id, (&user).into());
            }
            if !workplaces.contains_key(&a.workplace_id) {
                let workplace = self
                    .store
                    .find_workplace(a.workplace_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Workplace not found".into()))?;
                workplaces.insert(a.workplace_id, (&workplace).into());
            }
            views.push(AssignmentView::new(
                &a,
                users[&a.user_id].clone(),
                workplaces[&a.workplace_id].clone(),
                now,
            ));
        }

        Ok(views)
    }

    async fn recipients(&self, auth: &AuthUser, view: &AssignmentView) -> Vec<Uuid> {
        let mut ids = vec![view.user_id];
        if self.recipients.actor {
            ids.push(auth.id);
        }
        if self.recipients.org_admins {
            match self.store.list_org_admins(view.org_id).await {
                Ok(admins) => ids.extend(admins.iter().map(|u| u.id)),
                Err(e) => tracing::warn!(org_id = %view.org_id, error = %e, "could not resolve org admins"),
            }
        }
        let mut seen = std::collections::HashSet::new();
        ids.retain(|id| seen.insert(*id));
        ids
    }

    /// Best-effort fan-out; failures are logged and never reach the caller.
    async fn emit(&self, auth: &AuthUser, view: &AssignmentView, kind: NotificationKind, at: OffsetDateTime) {
        let recipients = self.recipients(auth, view).await;
        let deliveries = recipients
            .iter()
            .map(|recipient| self.emitter.notify(*recipient, view, kind, at));

        for (recipient, result) in recipients.iter().zip(join_all(deliveries).await) {
            if let Err(e) = result {
                tracing::warn!(
                    assignment_id = %view.id,
                    recipient = %recipient,
                    error = %e,
                    "notification delivery failed"
                );
            }
        }
    }
}

fn history_limit(limit: Option<i64>) -> usize {
    limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT) as usize
}

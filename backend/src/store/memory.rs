use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AssignmentRepository, NotificationRepository, OrganizationRepository, StoreError,
    StoreResult, UserRepository, WorkplaceRepository,
};
use crate::auth::Role;
use crate::models::{
    assignment::{Assignment, AssignmentFilter},
    notification::Notification,
    organization::{NewOrganization, Organization},
    user::{NewUser, User},
    workplace::{NewWorkplace, Workplace, WorkplaceFilter},
};

#[derive(Debug, Default)]
struct Tables {
    organizations: Vec<Organization>,
    users: Vec<User>,
    workplaces: Vec<Workplace>,
    assignments: Vec<Assignment>,
    notifications: Vec<Notification>,
}

/// Process-local store with the same uniqueness rules as the Postgres schema.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of repository calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Notifications still pointing at `assignment_id`. Not counted as a
    /// repository call.
    pub async fn count_notifications_for_assignment(&self, assignment_id: Uuid) -> usize {
        let t = self.tables.read().await;
        t.notifications
            .iter()
            .filter(|n| n.assignment_id == Some(assignment_id))
            .count()
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn page<T: Clone>(rows: Vec<&T>, limit: i64, offset: i64) -> (Vec<T>, i64) {
    let total = rows.len() as i64;
    let rows = rows
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .cloned()
        .collect();
    (rows, total)
}

#[async_trait]
impl OrganizationRepository for MemoryStore {
    async fn create_organization(&self, new: NewOrganization) -> StoreResult<Organization> {
        self.hit();
        let mut t = self.tables.write().await;
        if t.organizations.iter().any(|o| o.slug == new.slug) {
            return Err(StoreError::Duplicate(format!("organization slug '{}'", new.slug)));
        }
        let now = OffsetDateTime::now_utc();
        let org = Organization {
            id: Uuid::new_v4(),
            name: new.name,
            slug: new.slug,
            timezone: new.timezone,
            created_at: now,
            updated_at: now,
        };
        t.organizations.push(org.clone());
        Ok(org)
    }

    async fn find_organization(&self, id: Uuid) -> StoreResult<Option<Organization>> {
        self.hit();
        let t = self.tables.read().await;
        Ok(t.organizations.iter().find(|o| o.id == id).cloned())
    }

    async fn find_organization_by_slug(&self, slug: &str) -> StoreResult<Option<Organization>> {
        self.hit();
        let t = self.tables.read().await;
        Ok(t.organizations.iter().find(|o| o.slug == slug).cloned())
    }

    async fn list_organizations(&self) -> StoreResult<Vec<Organization>> {
        self.hit();
        let t = self.tables.read().await;
        let mut orgs = t.organizations.clone();
        orgs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(orgs)
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        self.hit();
        let mut t = self.tables.write().await;
        if !t.organizations.iter().any(|o| o.id == new.org_id) {
            return Err(StoreError::MissingReference(format!("organization {}", new.org_id)));
        }
        if t.users.iter().any(|u| u.email.eq_ignore_ascii_case(&new.email)) {
            return Err(StoreError::Duplicate(format!("email '{}'", new.email)));
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            org_id: new.org_id,
            email: new.email,
            password_hash: new.password_hash,
            full_name: new.full_name,
            position: new.position,
            role: new.role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.hit();
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.hit();
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn list_users(&self, org_id: Uuid, limit: i64, offset: i64) -> StoreResult<(Vec<User>, i64)> {
        self.hit();
        let t = self.tables.read().await;
        let mut rows: Vec<&User> = t.users.iter().filter(|u| u.org_id == org_id).collect();
        rows.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(page(rows, limit, offset))
    }

    async fn list_org_admins(&self, org_id: Uuid) -> StoreResult<Vec<User>> {
        self.hit();
        let t = self.tables.read().await;
        Ok(t.users
            .iter()
            .filter(|u| u.org_id == org_id && u.is_active && u.role >= Role::OrgAdmin)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl WorkplaceRepository for MemoryStore {
    async fn create_workplace(&self, new: NewWorkplace) -> StoreResult<Workplace> {
        self.hit();
        let mut t = self.tables.write().await;
        if !t.organizations.iter().any(|o| o.id == new.org_id) {
            return Err(StoreError::MissingReference(format!("organization {}", new.org_id)));
        }
        if t.workplaces.iter().any(|w| w.org_id == new.org_id && w.code == new.code) {
            return Err(StoreError::Duplicate(format!("workplace code '{}'", new.code)));
        }
        let now = OffsetDateTime::now_utc();
        let workplace = Workplace {
            id: Uuid::new_v4(),
            org_id: new.org_id,
            code: new.code,
            name: new.name,
            location: new.location,
            capacity: new.capacity,
            is_active: new.is_active,
            created_at: now,
            updated_at: now,
        };
        t.workplaces.push(workplace.clone());
        Ok(workplace)
    }

    async fn find_workplace(&self, id: Uuid) -> StoreResult<Option<Workplace>> {
        self.hit();
        let t = self.tables.read().await;
        Ok(t.workplaces.iter().find(|w| w.id == id).cloned())
    }

    async fn list_workplaces(&self, filter: &WorkplaceFilter) -> StoreResult<(Vec<Workplace>, i64)> {
        self.hit();
        let t = self.tables.read().await;
        let needle = filter.search.as_deref().map(str::to_lowercase);
        let mut rows: Vec<&Workplace> = t
            .workplaces
            .iter()
            .filter(|w| w.org_id == filter.org_id)
            .filter(|w| filter.is_active.map_or(true, |active| w.is_active == active))
            .filter(|w| match &needle {
                None => true,
                Some(n) => {
                    w.code.to_lowercase().contains(n)
                        || w.name.to_lowercase().contains(n)
                        || w.location.as_deref().is_some_and(|l| l.to_lowercase().contains(n))
                }
            })
            .collect();
        rows.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(page(rows, filter.limit, filter.offset))
    }

    async fn update_workplace(&self, workplace: &Workplace) -> StoreResult<Option<Workplace>> {
        self.hit();
        let mut t = self.tables.write().await;
        if t.workplaces.iter().any(|w| {
            w.id != workplace.id && w.org_id == workplace.org_id && w.code == workplace.code
        }) {
            return Err(StoreError::Duplicate(format!("workplace code '{}'", workplace.code)));
        }
        match t.workplaces.iter_mut().find(|w| w.id == workplace.id) {
            Some(row) => {
                row.code = workplace.code.clone();
                row.name = workplace.name.clone();
                row.location = workplace.location.clone();
                row.capacity = workplace.capacity;
                row.is_active = workplace.is_active;
                row.updated_at = workplace.updated_at;
                Ok(Some(row.clone()))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl AssignmentRepository for MemoryStore {
    async fn insert_assignment(&self, assignment: &Assignment) -> StoreResult<Assignment> {
        self.hit();
        let mut t = self.tables.write().await;
        if !t.users.iter().any(|u| u.id == assignment.user_id) {
            return Err(StoreError::MissingReference(format!("user {}", assignment.user_id)));
        }
        if !t.workplaces.iter().any(|w| w.id == assignment.workplace_id) {
            return Err(StoreError::MissingReference(format!(
                "workplace {}",
                assignment.workplace_id
            )));
        }
        t.assignments.push(assignment.clone());
        Ok(assignment.clone())
    }

    async fn find_assignment(&self, id: Uuid) -> StoreResult<Option<Assignment>> {
        self.hit();
        let t = self.tables.read().await;
        Ok(t.assignments.iter().find(|a| a.id == id).cloned())
    }

    async fn update_assignment(&self, assignment: &Assignment) -> StoreResult<Option<Assignment>> {
        self.hit();
        let mut t = self.tables.write().await;
        match t.assignments.iter_mut().find(|a| a.id == assignment.id) {
            Some(row) => {
                row.workplace_id = assignment.workplace_id;
                row.starts_at = assignment.starts_at;
                row.ends_at = assignment.ends_at;
                row.status = assignment.status;
                row.updated_at = assignment.updated_at;
                Ok(Some(row.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_assignment(&self, id: Uuid) -> StoreResult<bool> {
        self.hit();
        let mut t = self.tables.write().await;
        if t.notifications.iter().any(|n| n.assignment_id == Some(id)) {
            return Err(StoreError::MissingReference(format!(
                "assignment {} is still referenced by notifications",
                id
            )));
        }
        let before = t.assignments.len();
        t.assignments.retain(|a| a.id != id);
        Ok(t.assignments.len() != before)
    }

    async fn list_assignments(&self, filter: &AssignmentFilter) -> StoreResult<(Vec<Assignment>, i64)> {
        self.hit();
        let t = self.tables.read().await;
        let mut rows: Vec<&Assignment> = t.assignments.iter().filter(|a| filter.matches(a)).collect();
        rows.sort_by(|a, b| b.starts_at.cmp(&a.starts_at).then_with(|| b.id.cmp(&a.id)));
        Ok(page(rows, filter.limit, filter.offset))
    }

    async fn assignments_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Assignment>> {
        self.hit();
        let t = self.tables.read().await;
        Ok(t.assignments.iter().filter(|a| a.user_id == user_id).cloned().collect())
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn insert_notification(&self, notification: &Notification) -> StoreResult<Notification> {
        self.hit();
        let mut t = self.tables.write().await;
        if let Some(assignment_id) = notification.assignment_id {
            if !t.assignments.iter().any(|a| a.id == assignment_id) {
                return Err(StoreError::MissingReference(format!("assignment {}", assignment_id)));
            }
        }
        t.notifications.push(notification.clone());
        Ok(notification.clone())
    }

    async fn list_notifications(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<Notification>> {
        self.hit();
        let t = self.tables.read().await;
        let mut rows: Vec<Notification> = t
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn mark_notification_read(
        &self,
        id: Uuid,
        user_id: Uuid,
        at: OffsetDateTime,
    ) -> StoreResult<Option<Notification>> {
        self.hit();
        let mut t = self.tables.write().await;
        Ok(t.notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
            .map(|n| {
                n.read_at.get_or_insert(at);
                n.clone()
            }))
    }

    async fn delete_notifications_for_assignment(&self, assignment_id: Uuid) -> StoreResult<u64> {
        self.hit();
        let mut t = self.tables.write().await;
        let before = t.notifications.len();
        t.notifications.retain(|n| n.assignment_id != Some(assignment_id));
        Ok((before - t.notifications.len()) as u64)
    }
}

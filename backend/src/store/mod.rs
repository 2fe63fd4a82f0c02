//! Persistence collaborator.
//!
//! The lifecycle service only talks to these traits. `PgStore` is the
//! production implementation, `MemoryStore` backs tests and local runs.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::{
    assignment::{Assignment, AssignmentFilter},
    notification::Notification,
    organization::{NewOrganization, Organization},
    user::{NewUser, User},
    workplace::{NewWorkplace, Workplace, WorkplaceFilter},
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("duplicate value: {0}")]
    Duplicate(String),

    #[error("referenced record does not exist: {0}")]
    MissingReference(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait OrganizationRepository: Send + Sync + 'static {
    async fn create_organization(&self, new: NewOrganization) -> StoreResult<Organization>;

    async fn find_organization(&self, id: Uuid) -> StoreResult<Option<Organization>>;

    async fn find_organization_by_slug(&self, slug: &str) -> StoreResult<Option<Organization>>;

    async fn list_organizations(&self) -> StoreResult<Vec<Organization>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    async fn create_user(&self, new: NewUser) -> StoreResult<User>;

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn list_users(&self, org_id: Uuid, limit: i64, offset: i64) -> StoreResult<(Vec<User>, i64)>;

    /// Active users of the org holding at least the org-admin role.
    async fn list_org_admins(&self, org_id: Uuid) -> StoreResult<Vec<User>>;
}

#[async_trait]
pub trait WorkplaceRepository: Send + Sync + 'static {
    async fn create_workplace(&self, new: NewWorkplace) -> StoreResult<Workplace>;

    async fn find_workplace(&self, id: Uuid) -> StoreResult<Option<Workplace>>;

    async fn list_workplaces(&self, filter: &WorkplaceFilter) -> StoreResult<(Vec<Workplace>, i64)>;

    /// Overwrites code, name, location, capacity and the active flag.
    /// `None` when the row no longer exists.
    async fn update_workplace(&self, workplace: &Workplace) -> StoreResult<Option<Workplace>>;
}

#[async_trait]
pub trait AssignmentRepository: Send + Sync + 'static {
    async fn insert_assignment(&self, assignment: &Assignment) -> StoreResult<Assignment>;

    async fn find_assignment(&self, id: Uuid) -> StoreResult<Option<Assignment>>;

    /// Overwrites the mutable columns. `None` when the row no longer exists.
    async fn update_assignment(&self, assignment: &Assignment) -> StoreResult<Option<Assignment>>;

    /// `false` when there was nothing to delete.
    async fn delete_assignment(&self, id: Uuid) -> StoreResult<bool>;

    /// Page of matching assignments ordered by `starts_at` descending, plus the total.
    async fn list_assignments(&self, filter: &AssignmentFilter) -> StoreResult<(Vec<Assignment>, i64)>;

    async fn assignments_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Assignment>>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync + 'static {
    async fn insert_notification(&self, notification: &Notification) -> StoreResult<Notification>;

    /// Newest first.
    async fn list_notifications(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<Notification>>;

    async fn mark_notification_read(
        &self,
        id: Uuid,
        user_id: Uuid,
        at: OffsetDateTime,
    ) -> StoreResult<Option<Notification>>;

    async fn delete_notifications_for_assignment(&self, assignment_id: Uuid) -> StoreResult<u64>;
}

pub trait Store:
    OrganizationRepository
    + UserRepository
    + WorkplaceRepository
    + AssignmentRepository
    + NotificationRepository
{
}

impl<T> Store for T where
    T: OrganizationRepository
        + UserRepository
        + WorkplaceRepository
        + AssignmentRepository
        + NotificationRepository
{
}

pub type DynStore = Arc<dyn Store>;

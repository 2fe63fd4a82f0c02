use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    AssignmentRepository, NotificationRepository, OrganizationRepository, StoreError,
    StoreResult, UserRepository, WorkplaceRepository,
};
use crate::auth::Role;
use crate::models::{
    assignment::{Assignment, AssignmentFilter, AssignmentStatus},
    notification::Notification,
    organization::{NewOrganization, Organization},
    user::{NewUser, User},
    workplace::{NewWorkplace, Workplace, WorkplaceFilter},
};

const ORG_COLUMNS: &str = "id, name, slug, timezone, created_at, updated_at";
const USER_COLUMNS: &str =
    "id, org_id, email, password_hash, full_name, position, role, is_active, created_at, updated_at";
const WORKPLACE_COLUMNS: &str =
    "id, org_id, code, name, location, capacity, is_active, created_at, updated_at";
const ASSIGNMENT_COLUMNS: &str =
    "id, org_id, user_id, workplace_id, starts_at, ends_at, status, created_by, created_at, updated_at";
const NOTIFICATION_COLUMNS: &str =
    "id, user_id, assignment_id, kind, message, payload, created_at, read_at";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps constraint violations onto store-level kinds.
fn map_db_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e {
        match db_err.code().as_deref() {
            // unique_violation
            Some("23505") => return StoreError::Duplicate(db_err.message().to_string()),
            // foreign_key_violation
            Some("23503") => return StoreError::MissingReference(db_err.message().to_string()),
            _ => {}
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl OrganizationRepository for PgStore {
    async fn create_organization(&self, new: NewOrganization) -> StoreResult<Organization> {
        sqlx::query_as::<_, Organization>(&format!(
            "INSERT INTO organizations (id, name, slug, timezone) VALUES ($1, $2, $3, $4) RETURNING {}",
            ORG_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.slug)
        .bind(&new.timezone)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn find_organization(&self, id: Uuid) -> StoreResult<Option<Organization>> {
        Ok(sqlx::query_as::<_, Organization>(&format!(
            "SELECT {} FROM organizations WHERE id = $1",
            ORG_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_organization_by_slug(&self, slug: &str) -> StoreResult<Option<Organization>> {
        Ok(sqlx::query_as::<_, Organization>(&format!(
            "SELECT {} FROM organizations WHERE slug = $1",
            ORG_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_organizations(&self) -> StoreResult<Vec<Organization>> {
        Ok(sqlx::query_as::<_, Organization>(&format!(
            "SELECT {} FROM organizations ORDER BY name",
            ORG_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?)
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, org_id, email, password_hash, full_name, position, role)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new.org_id)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.full_name)
        .bind(&new.position)
        .bind(new.role)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE lower(email) = lower($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_users(&self, org_id: Uuid, limit: i64, offset: i64) -> StoreResult<(Vec<User>, i64)> {
        let rows = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE org_id = $1 ORDER BY email LIMIT $2 OFFSET $3",
            USER_COLUMNS
        ))
        .bind(org_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE org_id = $1")
            .bind(org_id)
            .fetch_one(&self.pool)
            .await?;

        Ok((rows, total))
    }

    async fn list_org_admins(&self, org_id: Uuid) -> StoreResult<Vec<User>> {
        Ok(sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE org_id = $1 AND is_active = true AND role IN ($2, $3)",
            USER_COLUMNS
        ))
        .bind(org_id)
        .bind(Role::OrgAdmin)
        .bind(Role::SuperAdmin)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[async_trait]
impl WorkplaceRepository for PgStore {
    async fn create_workplace(&self, new: NewWorkplace) -> StoreResult<Workplace> {
        sqlx::query_as::<_, Workplace>(&format!(
            r#"
            INSERT INTO workplaces (id, org_id, code, name, location, capacity, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            WORKPLACE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new.org_id)
        .bind(&new.code)
        .bind(&new.name)
        .bind(&new.location)
        .bind(new.capacity)
        .bind(new.is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn find_workplace(&self, id: Uuid) -> StoreResult<Option<Workplace>> {
        Ok(sqlx::query_as::<_, Workplace>(&format!(
            "SELECT {} FROM workplaces WHERE id = $1",
            WORKPLACE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_workplaces(&self, filter: &WorkplaceFilter) -> StoreResult<(Vec<Workplace>, i64)> {
        let pattern = filter.search.as_deref().map(|s| format!("%{}%", s));
        let predicate = r#"
            WHERE org_id = $1
              AND ($2::bool IS NULL OR is_active = $2)
              AND ($3::text IS NULL OR code ILIKE $3 OR name ILIKE $3 OR location ILIKE $3)
        "#;

        let rows = sqlx::query_as::<_, Workplace>(&format!(
            "SELECT {} FROM workplaces {} ORDER BY code LIMIT $4 OFFSET $5",
            WORKPLACE_COLUMNS, predicate
        ))
        .bind(filter.org_id)
        .bind(filter.is_active)
        .bind(&pattern)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM workplaces {}", predicate))
            .bind(filter.org_id)
            .bind(filter.is_active)
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await?;

        Ok((rows, total))
    }

    async fn update_workplace(&self, w: &Workplace) -> StoreResult<Option<Workplace>> {
        sqlx::query_as::<_, Workplace>(&format!(
            r#"
            UPDATE workplaces
            SET code       = $2,
                name       = $3,
                location   = $4,
                capacity   = $5,
                is_active  = $6,
                updated_at = $7
            WHERE id = $1
            RETURNING {}
            "#,
            WORKPLACE_COLUMNS
        ))
        .bind(w.id)
        .bind(&w.code)
        .bind(&w.name)
        .bind(&w.location)
        .bind(w.capacity)
        .bind(w.is_active)
        .bind(w.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)
    }
}

/// Appends the WHERE clause for an assignment filter. Status is the
/// effective status at `filter.now`, expressed over the window columns.
fn push_assignment_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &AssignmentFilter) {
    qb.push(" WHERE TRUE");
    if let Some(org_id) = filter.org_id {
        qb.push(" AND org_id = ").push_bind(org_id);
    }
    if let Some(user_id) = filter.user_id {
        qb.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(workplace_id) = filter.workplace_id {
        qb.push(" AND workplace_id = ").push_bind(workplace_id);
    }
    match filter.status {
        None => {}
        Some(AssignmentStatus::Archived) => {
            qb.push(" AND status = ").push_bind(AssignmentStatus::Archived);
        }
        Some(AssignmentStatus::Planned) => {
            qb.push(" AND status <> ").push_bind(AssignmentStatus::Archived);
            qb.push(" AND starts_at > ").push_bind(filter.now);
        }
        Some(AssignmentStatus::Active) => {
            qb.push(" AND status <> ").push_bind(AssignmentStatus::Archived);
            qb.push(" AND starts_at <= ").push_bind(filter.now);
            qb.push(" AND (ends_at IS NULL OR ends_at > ").push_bind(filter.now);
            qb.push(")");
        }
        Some(AssignmentStatus::Completed) => {
            qb.push(" AND status <> ").push_bind(AssignmentStatus::Archived);
            qb.push(" AND ends_at <= ").push_bind(filter.now);
        }
    }
    if let Some(to) = filter.to {
        qb.push(" AND starts_at <= ").push_bind(to);
    }
    if let Some(from) = filter.from {
        qb.push(" AND (ends_at IS NULL OR ends_at > ").push_bind(from);
        qb.push(")");
    }
}

#[async_trait]
impl AssignmentRepository for PgStore {
    async fn insert_assignment(&self, a: &Assignment) -> StoreResult<Assignment> {
        sqlx::query_as::<_, Assignment>(&format!(
            r#"
            INSERT INTO assignments
                (id, org_id, user_id, workplace_id, starts_at, ends_at, status, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            ASSIGNMENT_COLUMNS
        ))
        .bind(a.id)
        .bind(a.org_id)
        .bind(a.user_id)
        .bind(a.workplace_id)
        .bind(a.starts_at)
        .bind(a.ends_at)
        .bind(a.status)
        .bind(a.created_by)
        .bind(a.created_at)
        .bind(a.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn find_assignment(&self, id: Uuid) -> StoreResult<Option<Assignment>> {
        Ok(sqlx::query_as::<_, Assignment>(&format!(
            "SELECT {} FROM assignments WHERE id = $1",
            ASSIGNMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn update_assignment(&self, a: &Assignment) -> StoreResult<Option<Assignment>> {
        sqlx::query_as::<_, Assignment>(&format!(
            r#"
            UPDATE assignments
            SET workplace_id = $2,
                starts_at    = $3,
                ends_at      = $4,
                status       = $5,
                updated_at   = $6
            WHERE id = $1
            RETURNING {}
            "#,
            ASSIGNMENT_COLUMNS
        ))
        .bind(a.id)
        .bind(a.workplace_id)
        .bind(a.starts_at)
        .bind(a.ends_at)
        .bind(a.status)
        .bind(a.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn delete_assignment(&self, id: Uuid) -> StoreResult<bool> {
        let rows = sqlx::query("DELETE FROM assignments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?
            .rows_affected();
        Ok(rows > 0)
    }

    async fn list_assignments(&self, filter: &AssignmentFilter) -> StoreResult<(Vec<Assignment>, i64)> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM assignments", ASSIGNMENT_COLUMNS));
        push_assignment_filter(&mut qb, filter);
        qb.push(" ORDER BY starts_at DESC, id DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);
        let rows = qb.build_query_as::<Assignment>().fetch_all(&self.pool).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM assignments");
        push_assignment_filter(&mut count, filter);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        Ok((rows, total))
    }

    async fn assignments_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Assignment>> {
        Ok(sqlx::query_as::<_, Assignment>(&format!(
            "SELECT {} FROM assignments WHERE user_id = $1 ORDER BY starts_at",
            ASSIGNMENT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[async_trait]
impl NotificationRepository for PgStore {
    async fn insert_notification(&self, n: &Notification) -> StoreResult<Notification> {
        sqlx::query_as::<_, Notification>(&format!(
            r#"
            INSERT INTO notifications (id, user_id, assignment_id, kind, message, payload, created_at, read_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            NOTIFICATION_COLUMNS
        ))
        .bind(n.id)
        .bind(n.user_id)
        .bind(n.assignment_id)
        .bind(n.kind)
        .bind(&n.message)
        .bind(&n.payload)
        .bind(n.created_at)
        .bind(n.read_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn list_notifications(&self, user_id: Uuid, limit: i64) -> StoreResult<Vec<Notification>> {
        Ok(sqlx::query_as::<_, Notification>(&format!(
            "SELECT {} FROM notifications WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
            NOTIFICATION_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn mark_notification_read(
        &self,
        id: Uuid,
        user_id: Uuid,
        at: OffsetDateTime,
    ) -> StoreResult<Option<Notification>> {
        Ok(sqlx::query_as::<_, Notification>(&format!(
            r#"
            UPDATE notifications
            SET read_at = COALESCE(read_at, $3)
            WHERE id = $1 AND user_id = $2
            RETURNING {}
            "#,
            NOTIFICATION_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_notifications_for_assignment(&self, assignment_id: Uuid) -> StoreResult<u64> {
        Ok(sqlx::query("DELETE FROM notifications WHERE assignment_id = $1")
            .bind(assignment_id)
            .execute(&self.pool)
            .await?
            .rows_affected())
    }
}

//! Org-boundary validation helpers.
//!
//! Every function verifies that a given resource belongs to the caller's
//! organization and returns `AppError::NotFound` if it doesn't (we don't
//! reveal that the resource exists in another org).

use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::models::{
    assignment::Assignment, organization::Organization, user::User, workplace::Workplace,
};
use crate::store::Store;

/// Active user belonging to `org_id`.
pub async fn verify_user(store: &dyn Store, user_id: Uuid, org_id: Uuid) -> Result<User> {
    store
        .find_user(user_id)
        .await?
        .filter(|u| u.org_id == org_id && u.is_active)
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

/// User visible to the caller, active or not.
pub async fn visible_user(store: &dyn Store, user_id: Uuid, auth: &AuthUser) -> Result<User> {
    store
        .find_user(user_id)
        .await?
        .filter(|u| auth.can_access_org(u.org_id))
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

pub async fn verify_workplace(store: &dyn Store, workplace_id: Uuid, org_id: Uuid) -> Result<Workplace> {
    store
        .find_workplace(workplace_id)
        .await?
        .filter(|w| w.org_id == org_id)
        .ok_or_else(|| AppError::NotFound("Workplace not found".into()))
}

pub async fn verify_organization(store: &dyn Store, org_id: Uuid, auth: &AuthUser) -> Result<Organization> {
    if !auth.can_access_org(org_id) {
        return Err(AppError::NotFound("Organization not found".into()));
    }
    store
        .find_organization(org_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Organization not found".into()))
}

pub async fn verify_assignment(store: &dyn Store, id: Uuid, auth: &AuthUser) -> Result<Assignment> {
    store
        .find_assignment(id)
        .await?
        .filter(|a| auth.can_access_org(a.org_id))
        .ok_or_else(|| AppError::NotFound("Assignment not found".into()))
}

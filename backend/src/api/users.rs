use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{hash_password, AuthUser, Role},
    error::{AppError, Result},
    models::{
        common::{Page, PageParams},
        user::{CreateUserRequest, NewUser, UserProfile},
    },
    org_guard,
    AppState,
};

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<UserProfile>>> {
    if !auth.role.can_manage_assignments() {
        return Err(AppError::Forbidden);
    }
    let page = params.resolve()?;

    let (rows, total) = state
        .store
        .list_users(auth.org_id, page.limit(), page.offset())
        .await?;
    let profiles = rows.into_iter().map(UserProfile::from).collect();

    Ok(Json(Page::new(profiles, total, page)))
}

pub async fn get_one(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserProfile>> {
    if !auth.role.can_manage_assignments() && auth.id != id {
        return Err(AppError::Forbidden);
    }

    let user = org_guard::visible_user(&*state.store, id, &auth).await?;
    Ok(Json(user.into()))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<UserProfile>> {
    if !auth.role.is_org_admin() {
        return Err(AppError::Forbidden);
    }
    req.validate()?;

    let role = req.role.unwrap_or(Role::Member);
    // Nobody hands out more privilege than they hold
    if role > auth.role {
        return Err(AppError::Forbidden);
    }

    let org_id = match req.org_id {
        Some(org_id) if auth.role.is_super_admin() => {
            org_guard::verify_organization(&*state.store, org_id, &auth).await?.id
        }
        _ => auth.org_id,
    };

    let password_hash = hash_password(&req.password).map_err(AppError::Internal)?;
    let user = state
        .store
        .create_user(NewUser {
            org_id,
            email: req.email.trim().to_lowercase(),
            password_hash,
            full_name: req.full_name,
            position: req.position,
            role,
        })
        .await?;

    tracing::info!(user_id = %user.id, org_id = %user.org_id, "user created");
    Ok(Json(user.into()))
}

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{AppError, Result},
    models::{
        assignment::{
            AssignmentListParams, AssignmentView, CreateAssignmentRequest,
            UpdateAssignmentRequest,
        },
        common::{LimitParams, Page},
        user::CurrentWorkplaceResponse,
    },
    AppState,
};

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(mut params): Query<AssignmentListParams>,
) -> Result<Json<Page<AssignmentView>>> {
    // Members only ever see their own placements
    if !auth.role.can_manage_assignments() {
        params.user_id = Some(auth.id);
    }
    Ok(Json(state.assignments.list(&auth, params).await?))
}

pub async fn get_one(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<AssignmentView>> {
    let view = state.assignments.get(&auth, id).await?;
    if !auth.role.can_manage_assignments() && view.user_id != auth.id {
        return Err(AppError::Forbidden);
    }
    Ok(Json(view))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateAssignmentRequest>,
) -> Result<Json<AssignmentView>> {
    if !auth.role.can_manage_assignments() {
        return Err(AppError::Forbidden);
    }
    Ok(Json(state.assignments.create(&auth, req).await?))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateAssignmentRequest>,
) -> Result<Json<AssignmentView>> {
    if !auth.role.can_manage_assignments() {
        return Err(AppError::Forbidden);
    }
    Ok(Json(state.assignments.update(&auth, id, patch).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    if !auth.role.can_manage_assignments() {
        return Err(AppError::Forbidden);
    }
    state.assignments.remove(&auth, id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

fn ensure_can_view_user(auth: &AuthUser, user_id: Uuid) -> Result<()> {
    if auth.id != user_id && !auth.role.can_manage_assignments() {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub async fn current_for_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Option<AssignmentView>>> {
    ensure_can_view_user(&auth, user_id)?;
    Ok(Json(state.assignments.current_for_user(&auth, user_id).await?))
}

pub async fn history_for_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<AssignmentView>>> {
    ensure_can_view_user(&auth, user_id)?;
    Ok(Json(
        state
            .assignments
            .history_for_user(&auth, user_id, params.limit)
            .await?,
    ))
}

pub async fn my_current_workplace(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<LimitParams>,
) -> Result<Json<CurrentWorkplaceResponse>> {
    Ok(Json(
        state
            .assignments
            .current_workplace(&auth, auth.id, params.limit)
            .await?,
    ))
}

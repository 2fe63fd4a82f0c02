use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{AppError, Result},
    models::{common::LimitParams, notification::Notification},
    AppState,
};

/// The caller's notifications, newest first. `limit` defaults to 10, capped at 50.
pub async fn list_mine(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<Notification>>> {
    let rows = state
        .store
        .list_notifications(auth.id, params.limit_or(10, 50))
        .await?;
    Ok(Json(rows))
}

pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>> {
    let now = state.clock.now();
    let n = state
        .store
        .mark_notification_read(id, auth.id, now)
        .await?
        .ok_or_else(|| AppError::NotFound("Notification not found".into()))?;
    Ok(Json(n))
}

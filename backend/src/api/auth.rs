use axum::{extract::State, Json};

use crate::{
    auth::{create_token, verify_password, AuthUser},
    error::{AppError, Result},
    models::{
        organization::OrgSummary,
        user::{LoginRequest, LoginResponse, MeResponse},
    },
    AppState,
};

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let user = state
        .store
        .find_user_by_email(&req.email)
        .await?
        .filter(|u| u.is_active)
        .ok_or(AppError::Unauthorized)?;

    if !verify_password(&req.password, &user.password_hash).map_err(AppError::Internal)? {
        return Err(AppError::Unauthorized);
    }

    let token = create_token(
        user.id,
        user.org_id,
        user.role,
        &state.jwt_secret,
        state.jwt_expiry_hours,
    )
    .map_err(AppError::Internal)?;

    tracing::info!(user_id = %user.id, "login succeeded");

    Ok(Json(LoginResponse {
        token,
        user: user.into(),
    }))
}

pub async fn me(State(state): State<AppState>, auth: AuthUser) -> Result<Json<MeResponse>> {
    let user = state
        .store
        .find_user(auth.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    let org = state.store.find_organization(user.org_id).await?;
    let current_assignment = state.assignments.current_for_user(&auth, auth.id).await?;

    Ok(Json(MeResponse {
        profile: user.into(),
        org: org.as_ref().map(OrgSummary::from),
        current_assignment,
    }))
}

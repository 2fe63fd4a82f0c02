use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    error::{AppError, Result},
    models::organization::{CreateOrganizationRequest, NewOrganization, Organization},
    org_guard,
    AppState,
};

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<Organization>>> {
    if !auth.role.is_super_admin() {
        return Err(AppError::Forbidden);
    }

    Ok(Json(state.store.list_organizations().await?))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateOrganizationRequest>,
) -> Result<Json<Organization>> {
    if !auth.role.is_super_admin() {
        return Err(AppError::Forbidden);
    }
    req.validate()?;

    let timezone = req.timezone.unwrap_or_else(|| "UTC".into());
    if timezone.parse::<chrono_tz::Tz>().is_err() {
        return Err(AppError::BadRequest(format!("Unknown timezone '{}'", timezone)));
    }

    let org = state
        .store
        .create_organization(NewOrganization {
            name: req.name,
            slug: req.slug.trim().to_string(),
            timezone,
        })
        .await?;

    tracing::info!(org_id = %org.id, slug = %org.slug, "organization created");
    Ok(Json(org))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Organization>> {
    let org = org_guard::verify_organization(&*state.store, id, &auth).await?;
    Ok(Json(org))
}

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    error::{AppError, Result},
    models::{
        common::{Page, PageParams},
        workplace::{
            CreateWorkplaceRequest, NewWorkplace, UpdateWorkplaceRequest, Workplace, WorkplaceFilter,
            WorkplaceListParams,
        },
    },
    org_guard,
    AppState,
};

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<WorkplaceListParams>,
) -> Result<Json<Page<Workplace>>> {
    let page = PageParams {
        page: params.page,
        page_size: params.page_size,
    }
    .resolve()?;

    let filter = WorkplaceFilter {
        org_id: auth.org_id,
        search: params
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        is_active: params.is_active,
        limit: page.limit(),
        offset: page.offset(),
    };
    let (rows, total) = state.store.list_workplaces(&filter).await?;

    Ok(Json(Page::new(rows, total, page)))
}

pub async fn get_one(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Workplace>> {
    let workplace = org_guard::verify_workplace(&*state.store, id, auth.org_id).await?;
    Ok(Json(workplace))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateWorkplaceRequest>,
) -> Result<Json<Workplace>> {
    if !auth.role.is_org_admin() {
        return Err(AppError::Forbidden);
    }
    req.validate()?;

    let workplace = state
        .store
        .create_workplace(NewWorkplace {
            org_id: auth.org_id,
            code: req.code.trim().to_string(),
            name: req.name,
            location: req.location,
            capacity: req.capacity,
            is_active: req.is_active.unwrap_or(true),
        })
        .await?;

    tracing::info!(workplace_id = %workplace.id, code = %workplace.code, "workplace created");
    Ok(Json(workplace))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateWorkplaceRequest>,
) -> Result<Json<Workplace>> {
    if !auth.role.is_org_admin() {
        return Err(AppError::Forbidden);
    }
    req.validate()?;

    let existing = org_guard::verify_workplace(&*state.store, id, auth.org_id).await?;
    let merged = req.merge(&existing, state.clock.now());
    let workplace = state
        .store
        .update_workplace(&merged)
        .await?
        .ok_or_else(|| AppError::NotFound("Workplace not found".into()))?;

    tracing::info!(
        workplace_id = %workplace.id,
        code = %workplace.code,
        is_active = workplace.is_active,
        "workplace updated"
    );
    Ok(Json(workplace))
}

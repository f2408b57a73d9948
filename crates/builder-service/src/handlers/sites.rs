//! Site CRUD endpoints (§3, §6).

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use platform_core::pagination::{PageParams, PageQuery, Paginated};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use builder_domain::model::{Site, SiteSettings};
use builder_domain::validation::validate_slug;

use crate::auth::AuthContext;
use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct CreateSiteRequest {
    pub name: String,
    pub slug: String,
    pub subdomain: String,
    #[serde(default)]
    pub settings: SiteSettings,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSiteRequest {
    pub name: String,
    #[serde(default)]
    pub settings: SiteSettings,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

pub async fn list(
    auth: AuthContext,
    State(state): State<SharedState>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Paginated<Site>>, ApiError> {
    let params: PageParams = page.into();
    let result = state.sites.list(auth.scope(), params).await?;
    Ok(Json(result))
}

pub async fn create(
    auth: AuthContext,
    State(state): State<SharedState>,
    Json(req): Json<CreateSiteRequest>,
) -> Result<Json<Site>, ApiError> {
    if !auth.role.can_manage() {
        return Err(ApiError::Forbidden("only owners and admins may create sites".into()));
    }
    validate_slug("slug", &req.slug)?;
    validate_slug("subdomain", &req.subdomain)?;
    let now = Utc::now();
    let site = Site {
        id: Uuid::new_v4(),
        tenant_id: auth.tenant_id,
        name: req.name,
        slug: req.slug,
        subdomain: req.subdomain,
        settings: req.settings,
        active_version_id: None,
        created_at: now,
        updated_at: now,
    };
    let site = state.sites.create(site).await?;
    Ok(Json(site))
}

pub async fn get(
    auth: AuthContext,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Site>, ApiError> {
    let site = state.sites.get(auth.scope(), id).await?;
    Ok(Json(site))
}

pub async fn update(
    auth: AuthContext,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateSiteRequest>,
) -> Result<Json<Site>, ApiError> {
    if !auth.role.can_manage() {
        return Err(ApiError::Forbidden("only owners and admins may update sites".into()));
    }
    let mut site = state.sites.get(auth.scope(), id).await?;
    site.name = req.name;
    site.settings = req.settings;
    site.updated_at = Utc::now();
    let site = state.sites.update(site).await?;
    Ok(Json(site))
}

pub async fn delete(
    auth: AuthContext,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, ApiError> {
    if !auth.role.can_manage() {
        return Err(ApiError::Forbidden("only owners and admins may delete sites".into()));
    }
    // Confirms tenant ownership before delegating to the repository, which
    // has no delete of its own (sites are soft-retired by clearing their
    // active version rather than removed, since artifact history must
    // survive for rollback).
    let mut site = state.sites.get(auth.scope(), id).await?;
    site.active_version_id = None;
    site.updated_at = Utc::now();
    state.sites.update(site).await?;
    Ok(Json(DeleteResponse { success: true }))
}

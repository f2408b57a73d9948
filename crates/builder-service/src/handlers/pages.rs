//! Page CRUD endpoints, nested under a site (§3, §6).

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use builder_domain::model::Page;
use builder_domain::content::PageContent;
use builder_domain::validation::validate_page_path;

use crate::auth::AuthContext;
use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct CreatePageRequest {
    pub path: String,
    pub title: String,
    #[serde(default)]
    pub content: PageContent,
    #[serde(default)]
    pub seo_title: Option<String>,
    #[serde(default)]
    pub seo_description: Option<String>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePageRequest {
    pub title: String,
    pub content: PageContent,
    #[serde(default)]
    pub seo_title: Option<String>,
    #[serde(default)]
    pub seo_description: Option<String>,
    pub is_published: bool,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

pub async fn list(
    auth: AuthContext,
    State(state): State<SharedState>,
    Path(site_id): Path<Uuid>,
) -> Result<Json<Vec<Page>>, ApiError> {
    // `get` enforces the tenant boundary before the page listing, which
    // isn't tenant-scoped on its own (pages key off `site_id` alone).
    state.sites.get(auth.scope(), site_id).await?;
    let pages = state.pages.list_for_site(site_id).await?;
    Ok(Json(pages))
}

pub async fn create(
    auth: AuthContext,
    State(state): State<SharedState>,
    Path(site_id): Path<Uuid>,
    Json(req): Json<CreatePageRequest>,
) -> Result<Json<Page>, ApiError> {
    if !auth.role.can_manage() {
        return Err(ApiError::Forbidden("only owners and admins may create pages".into()));
    }
    state.sites.get(auth.scope(), site_id).await?;
    validate_page_path(&req.path)?;
    let now = Utc::now();
    let page = Page {
        id: Uuid::new_v4(),
        site_id,
        path: req.path,
        title: req.title,
        content: req.content,
        seo_title: req.seo_title,
        seo_description: req.seo_description,
        is_published: req.is_published,
        sort_order: req.sort_order,
        created_at: now,
        updated_at: now,
    };
    let page = state.pages.create(page).await?;
    Ok(Json(page))
}

pub async fn update(
    auth: AuthContext,
    State(state): State<SharedState>,
    Path((site_id, page_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdatePageRequest>,
) -> Result<Json<Page>, ApiError> {
    if !auth.role.can_manage() {
        return Err(ApiError::Forbidden("only owners and admins may update pages".into()));
    }
    state.sites.get(auth.scope(), site_id).await?;
    let mut page = state.pages.get(site_id, page_id).await?;
    page.title = req.title;
    page.content = req.content;
    page.seo_title = req.seo_title;
    page.seo_description = req.seo_description;
    page.is_published = req.is_published;
    page.sort_order = req.sort_order;
    page.updated_at = Utc::now();
    let page = state.pages.update(page).await?;
    Ok(Json(page))
}

pub async fn delete(
    auth: AuthContext,
    State(state): State<SharedState>,
    Path((site_id, page_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<DeleteResponse>, ApiError> {
    if !auth.role.can_manage() {
        return Err(ApiError::Forbidden("only owners and admins may delete pages".into()));
    }
    state.sites.get(auth.scope(), site_id).await?;
    state.pages.delete(site_id, page_id).await?;
    Ok(Json(DeleteResponse { success: true }))
}

//! Publish, rollback, and version-listing endpoints (§4.4, §6).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use builder_domain::model::{BuildJob, Site, SiteVersion};

use crate::auth::AuthContext;
use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub version: SiteVersion,
    pub build_job: BuildJob,
}

#[derive(Debug, Deserialize)]
pub struct RollbackRequest {
    pub target_version_id: Uuid,
}

pub async fn publish(
    auth: AuthContext,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<PublishResponse>), ApiError> {
    // Every role may publish (§3 EXPANSION: MEMBER "may execute and observe
    // runs and publish but not delete sites or workflows"); `auth` only
    // gates the site to its tenant via `build_engine.publish`'s scope.
    let (version, build_job) = state.build_engine.publish(auth.scope(), id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(PublishResponse { version, build_job }),
    ))
}

pub async fn rollback(
    auth: AuthContext,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RollbackRequest>,
) -> Result<Json<Site>, ApiError> {
    if !auth.role.can_manage() {
        return Err(ApiError::Forbidden("only owners and admins may roll back a site".into()));
    }
    let site = state
        .build_engine
        .rollback(auth.scope(), id, req.target_version_id)
        .await?;
    state.resolver.invalidate(&site.subdomain);
    Ok(Json(site))
}

pub async fn versions(
    auth: AuthContext,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<SiteVersion>>, ApiError> {
    state.sites.get(auth.scope(), id).await?;
    let versions = state.versions.list_for_site(id).await?;
    Ok(Json(versions))
}

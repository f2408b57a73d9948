//! Workflow CRUD and run-triggering endpoints (§4.1, §6).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use platform_core::pagination::{PageParams, PageQuery, Paginated};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use workflow_domain::model::{Run, Workflow, WorkflowDefinition};
use workflow_domain::validation::validate_definition;

use crate::auth::AuthContext;
use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct CreateWorkflowRequest {
    pub name: String,
    pub definition: WorkflowDefinition,
}

#[derive(Debug, Deserialize)]
pub struct UpdateWorkflowRequest {
    pub definition: WorkflowDefinition,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteWorkflowRequest {
    #[serde(default)]
    pub input: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub run: Run,
}

pub async fn list(
    auth: AuthContext,
    State(state): State<SharedState>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Paginated<Workflow>>, ApiError> {
    let params: PageParams = page.into();
    let result = state.workflows.list(auth.scope(), params).await?;
    Ok(Json(result))
}

pub async fn create(
    auth: AuthContext,
    State(state): State<SharedState>,
    Json(req): Json<CreateWorkflowRequest>,
) -> Result<Json<Workflow>, ApiError> {
    if !auth.role.can_manage() {
        return Err(ApiError::Forbidden("only owners and admins may create workflows".into()));
    }
    validate_definition(&req.definition)?;
    let now = Utc::now();
    let workflow = Workflow {
        id: Uuid::new_v4(),
        tenant_id: auth.tenant_id,
        name: req.name,
        version: 1,
        definition: req.definition,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    let workflow = state.workflows.create(workflow).await?;
    Ok(Json(workflow))
}

pub async fn get(
    auth: AuthContext,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Workflow>, ApiError> {
    let workflow = state.workflows.get(auth.scope(), id).await?;
    Ok(Json(workflow))
}

pub async fn update(
    auth: AuthContext,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateWorkflowRequest>,
) -> Result<Json<Workflow>, ApiError> {
    if !auth.role.can_manage() {
        return Err(ApiError::Forbidden("only owners and admins may update workflows".into()));
    }
    validate_definition(&req.definition)?;
    let mut workflow = state.workflows.get(auth.scope(), id).await?;
    workflow.definition = req.definition;
    workflow.version += 1;
    workflow.updated_at = Utc::now();
    let workflow = state.workflows.update(workflow).await?;
    Ok(Json(workflow))
}

pub async fn delete(
    auth: AuthContext,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !auth.role.can_manage() {
        return Err(ApiError::Forbidden("only owners and admins may delete workflows".into()));
    }
    state.workflows.soft_delete(auth.scope(), id).await?;
    Ok(Json(serde_json::json!({"success": true})))
}

pub async fn execute(
    auth: AuthContext,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ExecuteWorkflowRequest>,
) -> Result<(StatusCode, Json<RunResponse>), ApiError> {
    let run = state.engine.start_run(auth.scope(), id, req.input).await?;
    Ok((StatusCode::ACCEPTED, Json(RunResponse { run })))
}

pub async fn list_runs(
    auth: AuthContext,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Paginated<Run>>, ApiError> {
    let params: PageParams = page.into();
    let result = state
        .runs
        .list_for_workflow(auth.scope(), id, params)
        .await?;
    Ok(Json(result))
}

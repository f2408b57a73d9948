//! Run inspection, event streaming, and cancellation endpoints (§4.1, §6).

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use platform_core::pagination::{PageParams, PageQuery, Paginated};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use workflow_domain::model::{Event, Run, Step};

use crate::auth::AuthContext;
use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct RunDetail {
    pub run: Run,
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Parsed permissively: a value that isn't RFC 3339 is treated as absent
    /// rather than rejected (§8 boundary behavior), so it's read as a raw
    /// string here instead of letting serde reject the whole request.
    pub since: Option<String>,
    #[serde(flatten)]
    pub page: PageQuery,
}

impl EventsQuery {
    fn since(&self) -> Option<DateTime<Utc>> {
        self.since
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

pub async fn get(
    auth: AuthContext,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RunDetail>, ApiError> {
    let snapshot = state.engine.observe_run(auth.scope(), id).await?;
    Ok(Json(RunDetail {
        run: snapshot.run,
        steps: snapshot.steps,
    }))
}

pub async fn events(
    auth: AuthContext,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(q): Query<EventsQuery>,
) -> Result<Json<Paginated<Event>>, ApiError> {
    // Scope check: a run belongs to exactly one tenant, enforced by
    // `observe_run` first so cross-tenant ids never reach `list_events`.
    state.engine.observe_run(auth.scope(), id).await?;
    let params: PageParams = q.page.into();
    let since = q.since();
    let result = state.engine.list_events(id, since, params).await?;
    Ok(Json(result))
}

pub async fn cancel(
    auth: AuthContext,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Run>, ApiError> {
    let run = state.engine.cancel_run(auth.scope(), id).await?;
    Ok(Json(run))
}

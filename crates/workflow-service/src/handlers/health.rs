//! `GET /health` (§6): reports DB and job-store reachability and latency.

use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct DependencyHealth {
    pub status: &'static str,
    pub latency_ms: u128,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub db: DependencyHealth,
    pub job_store: DependencyHealth,
}

async fn check<F, Fut>(probe: F) -> DependencyHealth
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = Instant::now();
    let ok = probe().await;
    DependencyHealth {
        status: if ok { "ok" } else { "unreachable" },
        latency_ms: start.elapsed().as_millis(),
    }
}

pub async fn health_check(State(state): State<SharedState>) -> (StatusCode, Json<HealthReport>) {
    let db = check(|| async { state.db.ping().await.is_ok() }).await;
    let job_store = check(|| async { state.job_store.ping().await.is_ok() }).await;
    let healthy = db.status == "ok" && job_store.status == "ok";
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let report = HealthReport {
        status: if healthy { "ok" } else { "degraded" },
        db,
        job_store,
    };
    (status, Json(report))
}

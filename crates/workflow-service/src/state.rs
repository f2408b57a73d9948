//! Shared application state threaded through every handler (§9 "global
//! singletons map to a context object"). Built once in `main` and wrapped
//! in an `Arc` so axum can clone a handle per request.

use std::sync::Arc;

use platform_core::accounts::AccountsRepository;
use platform_core::auth::TokenIssuer;
use platform_core::job::JobStore;
use platform_core::ratelimit::KeyedRateLimiter;
use platform_core::sqlite::SqlitePool;
use workflow_engine::engine::Engine;
use workflow_engine::push_bus::PushBus;
use workflow_engine::repository::{EventRepository, RunRepository, StepRepository, WorkflowRepository};

use crate::config::AppConfig;

pub struct AppState {
    pub config: AppConfig,
    pub engine: Arc<Engine>,
    pub workflows: Arc<dyn WorkflowRepository>,
    pub runs: Arc<dyn RunRepository>,
    pub steps: Arc<dyn StepRepository>,
    pub events: Arc<dyn EventRepository>,
    pub accounts: Arc<dyn AccountsRepository>,
    pub job_store: Arc<dyn JobStore>,
    pub push_bus: Arc<PushBus>,
    pub tokens: TokenIssuer,
    pub db: SqlitePool,
    pub rate_limiter: Arc<KeyedRateLimiter>,
}

pub type SharedState = Arc<AppState>;

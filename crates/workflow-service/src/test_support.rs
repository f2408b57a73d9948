//! In-memory `AppState` builder shared by handler/router tests.

use std::sync::Arc;

use platform_core::accounts::InMemoryAccountsRepository;
use platform_core::auth::TokenIssuer;
use platform_core::config::{CommonConfig, Environment};
use platform_core::job::InMemoryJobStore;
use platform_core::ratelimit::KeyedRateLimiter;
use platform_core::sqlite::SqlitePool;
use workflow_engine::completion::MockCompletion;
use workflow_engine::engine::Engine;
use workflow_engine::push_bus::PushBus;
use workflow_engine::repository::in_memory::{
    InMemoryEventRepository, InMemoryRunRepository, InMemoryStepRepository, InMemoryWorkflowRepository,
};

use crate::config::AppConfig;
use crate::state::AppState;

pub fn test_state() -> Arc<AppState> {
    let workflows = Arc::new(InMemoryWorkflowRepository::new());
    let runs = Arc::new(InMemoryRunRepository::new());
    let steps = Arc::new(InMemoryStepRepository::new());
    let events = Arc::new(InMemoryEventRepository::new());
    let job_store = Arc::new(InMemoryJobStore::new());
    let push_bus = Arc::new(PushBus::new());

    let engine = Arc::new(Engine::new(
        workflows.clone(),
        runs.clone(),
        steps.clone(),
        events.clone(),
        job_store.clone(),
        Arc::new(MockCompletion),
        push_bus.clone(),
    ));

    Arc::new(AppState {
        config: AppConfig {
            common: CommonConfig {
                database_url: ":memory:".into(),
                kv_url: "memory://".into(),
                jwt_secret: "test-secret-at-least-eight".into(),
                port: 0,
                env: Environment::Test,
                log_level: "info".into(),
            },
            completion_api_key: None,
        },
        engine,
        workflows,
        runs,
        steps,
        events,
        accounts: Arc::new(InMemoryAccountsRepository::new()),
        job_store,
        push_bus,
        tokens: TokenIssuer::new("test-secret-at-least-eight"),
        db: SqlitePool::open_in_memory().expect("in-memory sqlite pool"),
        rate_limiter: KeyedRateLimiter::per_minute(1000),
    })
}

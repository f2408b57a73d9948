//! In-memory `AppState` builder shared by handler/router tests.

use std::sync::Arc;

use builder_engine::build::BuildEngine;
use builder_engine::repository::in_memory::{
    InMemoryBuildJobRepository, InMemoryPageRepository, InMemorySiteRepository, InMemorySiteVersionRepository,
};
use builder_engine::resolver::SiteResolver;
use platform_core::accounts::InMemoryAccountsRepository;
use platform_core::auth::TokenIssuer;
use platform_core::config::{CommonConfig, Environment};
use platform_core::job::InMemoryJobStore;
use platform_core::object_store::InMemoryObjectStore;
use platform_core::ratelimit::KeyedRateLimiter;
use platform_core::sqlite::SqlitePool;

use crate::config::AppConfig;
use crate::state::AppState;

pub fn test_state() -> Arc<AppState> {
    let sites = Arc::new(InMemorySiteRepository::new());
    let pages = Arc::new(InMemoryPageRepository::new());
    let versions = Arc::new(InMemorySiteVersionRepository::new());
    let jobs = Arc::new(InMemoryBuildJobRepository::new());
    let job_store = Arc::new(InMemoryJobStore::new());
    let objects = Arc::new(InMemoryObjectStore::new());

    let build_engine = Arc::new(BuildEngine::new(
        sites.clone(),
        pages.clone(),
        versions.clone(),
        jobs.clone(),
        job_store.clone(),
        objects.clone(),
    ));
    let resolver = Arc::new(SiteResolver::new(sites.clone(), versions.clone(), objects.clone()));

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
            object_store_path: "./data/objects-test".into(),
            cdn_base_url: None,
        },
        build_engine,
        resolver,
        sites,
        pages,
        versions,
        jobs,
        objects,
        accounts: Arc::new(InMemoryAccountsRepository::new()),
        job_store,
        tokens: TokenIssuer::new("test-secret-at-least-eight"),
        db: SqlitePool::open_in_memory().expect("in-memory sqlite pool"),
        rate_limiter: KeyedRateLimiter::per_minute(1000),
    })
}

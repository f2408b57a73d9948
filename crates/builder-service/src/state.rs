//! Shared application state threaded through every handler, mirroring
//! `workflow_service::state::AppState`.

use std::sync::Arc;

use builder_engine::build::BuildEngine;
use builder_engine::repository::{BuildJobRepository, PageRepository, SiteRepository, SiteVersionRepository};
use builder_engine::resolver::SiteResolver;
use platform_core::accounts::AccountsRepository;
use platform_core::auth::TokenIssuer;
use platform_core::job::JobStore;
use platform_core::object_store::ObjectStore;
use platform_core::ratelimit::KeyedRateLimiter;
use platform_core::sqlite::SqlitePool;

use crate::config::AppConfig;

pub struct AppState {
    pub config: AppConfig,
    pub build_engine: Arc<BuildEngine>,
    pub resolver: Arc<SiteResolver>,
    pub sites: Arc<dyn SiteRepository>,
    pub pages: Arc<dyn PageRepository>,
    pub versions: Arc<dyn SiteVersionRepository>,
    pub jobs: Arc<dyn BuildJobRepository>,
    pub objects: Arc<dyn ObjectStore>,
    pub accounts: Arc<dyn AccountsRepository>,
    pub job_store: Arc<dyn JobStore>,
    pub tokens: TokenIssuer,
    pub db: SqlitePool,
    pub rate_limiter: Arc<KeyedRateLimiter>,
}

pub type SharedState = Arc<AppState>;

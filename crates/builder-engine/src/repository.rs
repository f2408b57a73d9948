//! Repository traits the build engine is built against, mirroring the
//! workflow engine's `repository` module: every method that can cross a
//! tenant boundary takes a `TenantScope`, and PK-only lookups (used by the
//! build worker and the public site resolver, neither of which carries a
//! tenant-scoped caller) are named `get_by_id`/`get_any_tenant` variants.

use async_trait::async_trait;
use platform_core::errors::RepositoryError;
use platform_core::pagination::{PageParams, Paginated};
use platform_core::tenancy::TenantScope;
use uuid::Uuid;

use builder_domain::model::{BuildJob, Page, Site, SiteVersion};

#[async_trait]
pub trait SiteRepository: Send + Sync {
    async fn create(&self, site: Site) -> Result<Site, RepositoryError>;
    async fn get(&self, scope: TenantScope, id: Uuid) -> Result<Site, RepositoryError>;
    /// Subdomain lookup with no tenant filter — the public `/serve` path
    /// resolves a request by subdomain alone, before any tenant is known.
    async fn get_by_subdomain(&self, subdomain: &str) -> Result<Site, RepositoryError>;
    async fn list(
        &self,
        scope: TenantScope,
        page: PageParams,
    ) -> Result<Paginated<Site>, RepositoryError>;
    async fn update(&self, site: Site) -> Result<Site, RepositoryError>;
}

#[async_trait]
pub trait PageRepository: Send + Sync {
    async fn create(&self, page: Page) -> Result<Page, RepositoryError>;
    async fn get(&self, site_id: Uuid, id: Uuid) -> Result<Page, RepositoryError>;
    async fn get_by_path(&self, site_id: Uuid, path: &str) -> Result<Page, RepositoryError>;
    async fn list_for_site(&self, site_id: Uuid) -> Result<Vec<Page>, RepositoryError>;
    async fn update(&self, page: Page) -> Result<Page, RepositoryError>;
    async fn delete(&self, site_id: Uuid, id: Uuid) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait SiteVersionRepository: Send + Sync {
    async fn create(&self, version: SiteVersion) -> Result<SiteVersion, RepositoryError>;
    async fn get(&self, id: Uuid) -> Result<SiteVersion, RepositoryError>;
    async fn get_for_site(&self, site_id: Uuid, id: Uuid) -> Result<SiteVersion, RepositoryError>;
    async fn list_for_site(&self, site_id: Uuid) -> Result<Vec<SiteVersion>, RepositoryError>;
    /// Highest `version` number already issued for this site, used to
    /// compute the next one (§4.4 step 2: "next version number = max + 1").
    async fn max_version(&self, site_id: Uuid) -> Result<u32, RepositoryError>;
    async fn update(&self, version: SiteVersion) -> Result<SiteVersion, RepositoryError>;
}

#[async_trait]
pub trait BuildJobRepository: Send + Sync {
    async fn create(&self, job: BuildJob) -> Result<BuildJob, RepositoryError>;
    async fn get(&self, id: Uuid) -> Result<BuildJob, RepositoryError>;
    async fn update(&self, job: BuildJob) -> Result<BuildJob, RepositoryError>;
}

pub mod in_memory {
    //! In-memory repository implementations backing unit/integration tests,
    //! mirroring `workflow_engine::repository::in_memory`.

    use std::collections::HashMap;
    use std::sync::RwLock;

    use super::*;

    #[derive(Default)]
    pub struct InMemorySiteRepository {
        sites: RwLock<HashMap<Uuid, Site>>,
    }

    impl InMemorySiteRepository {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl SiteRepository for InMemorySiteRepository {
        async fn create(&self, site: Site) -> Result<Site, RepositoryError> {
            let mut guard = self.sites.write().unwrap();
            if guard.values().any(|s| s.subdomain == site.subdomain) {
                return Err(RepositoryError::Conflict(format!(
                    "subdomain {} already in use",
                    site.subdomain
                )));
            }
            guard.insert(site.id, site.clone());
            Ok(site)
        }

        async fn get(&self, scope: TenantScope, id: Uuid) -> Result<Site, RepositoryError> {
            self.sites
                .read()
                .unwrap()
                .get(&id)
                .filter(|s| s.tenant_id == scope.tenant_id)
                .cloned()
                .ok_or_else(|| RepositoryError::NotFound(format!("site {id}")))
        }

        async fn get_by_subdomain(&self, subdomain: &str) -> Result<Site, RepositoryError> {
            self.sites
                .read()
                .unwrap()
                .values()
                .find(|s| s.subdomain == subdomain)
                .cloned()
                .ok_or_else(|| RepositoryError::NotFound(format!("site with subdomain {subdomain}")))
        }

        async fn list(
            &self,
            scope: TenantScope,
            page: PageParams,
        ) -> Result<Paginated<Site>, RepositoryError> {
            let guard = self.sites.read().unwrap();
            let mut all: Vec<Site> = guard
                .values()
                .filter(|s| s.tenant_id == scope.tenant_id)
                .cloned()
                .collect();
            all.sort_by_key(|s| s.created_at);
            let total = all.len() as u64;
            let start = page.offset() as usize;
            let page_items = all.into_iter().skip(start).take(page.limit as usize).collect();
            Ok(Paginated::new(page_items, page, total))
        }

        async fn update(&self, site: Site) -> Result<Site, RepositoryError> {
            self.sites.write().unwrap().insert(site.id, site.clone());
            Ok(site)
        }
    }

    #[derive(Default)]
    pub struct InMemoryPageRepository {
        pages: RwLock<HashMap<Uuid, Page>>,
    }

    impl InMemoryPageRepository {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl PageRepository for InMemoryPageRepository {
        async fn create(&self, page: Page) -> Result<Page, RepositoryError> {
            let mut guard = self.pages.write().unwrap();
            if guard
                .values()
                .any(|p| p.site_id == page.site_id && p.path == page.path)
            {
                return Err(RepositoryError::Conflict(format!(
                    "page path {} already exists for this site",
                    page.path
                )));
            }
            guard.insert(page.id, page.clone());
            Ok(page)
        }

        async fn get(&self, site_id: Uuid, id: Uuid) -> Result<Page, RepositoryError> {
            self.pages
                .read()
                .unwrap()
                .get(&id)
                .filter(|p| p.site_id == site_id)
                .cloned()
                .ok_or_else(|| RepositoryError::NotFound(format!("page {id}")))
        }

        async fn get_by_path(&self, site_id: Uuid, path: &str) -> Result<Page, RepositoryError> {
            self.pages
                .read()
                .unwrap()
                .values()
                .find(|p| p.site_id == site_id && p.path == path)
                .cloned()
                .ok_or_else(|| RepositoryError::NotFound(format!("page at path {path}")))
        }

        async fn list_for_site(&self, site_id: Uuid) -> Result<Vec<Page>, RepositoryError> {
            let guard = self.pages.read().unwrap();
            let mut pages: Vec<Page> = guard
                .values()
                .filter(|p| p.site_id == site_id)
                .cloned()
                .collect();
            pages.sort_by_key(|p| p.sort_order);
            Ok(pages)
        }

        async fn update(&self, page: Page) -> Result<Page, RepositoryError> {
            let mut guard = self.pages.write().unwrap();
            guard.insert(page.id, page.clone());
            Ok(page)
        }

        async fn delete(&self, site_id: Uuid, id: Uuid) -> Result<(), RepositoryError> {
            let mut guard = self.pages.write().unwrap();
            let exists = guard.get(&id).is_some_and(|p| p.site_id == site_id);
            if !exists {
                return Err(RepositoryError::NotFound(format!("page {id}")));
            }
            guard.remove(&id);
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct InMemorySiteVersionRepository {
        versions: RwLock<HashMap<Uuid, SiteVersion>>,
    }

    impl InMemorySiteVersionRepository {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl SiteVersionRepository for InMemorySiteVersionRepository {
        async fn create(&self, version: SiteVersion) -> Result<SiteVersion, RepositoryError> {
            self.versions
                .write()
                .unwrap()
                .insert(version.id, version.clone());
            Ok(version)
        }

        async fn get(&self, id: Uuid) -> Result<SiteVersion, RepositoryError> {
            self.versions
                .read()
                .unwrap()
                .get(&id)
                .cloned()
                .ok_or_else(|| RepositoryError::NotFound(format!("site version {id}")))
        }

        async fn get_for_site(&self, site_id: Uuid, id: Uuid) -> Result<SiteVersion, RepositoryError> {
            self.versions
                .read()
                .unwrap()
                .get(&id)
                .filter(|v| v.site_id == site_id)
                .cloned()
                .ok_or_else(|| RepositoryError::NotFound(format!("site version {id}")))
        }

        async fn list_for_site(&self, site_id: Uuid) -> Result<Vec<SiteVersion>, RepositoryError> {
            let guard = self.versions.read().unwrap();
            let mut versions: Vec<SiteVersion> = guard
                .values()
                .filter(|v| v.site_id == site_id)
                .cloned()
                .collect();
            versions.sort_by_key(|v| v.version);
            Ok(versions)
        }

        async fn max_version(&self, site_id: Uuid) -> Result<u32, RepositoryError> {
            let guard = self.versions.read().unwrap();
            Ok(guard
                .values()
                .filter(|v| v.site_id == site_id)
                .map(|v| v.version)
                .max()
                .unwrap_or(0))
        }

        async fn update(&self, version: SiteVersion) -> Result<SiteVersion, RepositoryError> {
            self.versions
                .write()
                .unwrap()
                .insert(version.id, version.clone());
            Ok(version)
        }
    }

    #[derive(Default)]
    pub struct InMemoryBuildJobRepository {
        jobs: RwLock<HashMap<Uuid, BuildJob>>,
    }

    impl InMemoryBuildJobRepository {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl BuildJobRepository for InMemoryBuildJobRepository {
        async fn create(&self, job: BuildJob) -> Result<BuildJob, RepositoryError> {
            self.jobs.write().unwrap().insert(job.id, job.clone());
            Ok(job)
        }

        async fn get(&self, id: Uuid) -> Result<BuildJob, RepositoryError> {
            self.jobs
                .read()
                .unwrap()
                .get(&id)
                .cloned()
                .ok_or_else(|| RepositoryError::NotFound(format!("build job {id}")))
        }

        async fn update(&self, job: BuildJob) -> Result<BuildJob, RepositoryError> {
            self.jobs.write().unwrap().insert(job.id, job.clone());
            Ok(job)
        }
    }
}

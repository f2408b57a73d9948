//! Build engine (§4.4): publish protocol, build execution, rollback, and
//! the atomicity guarantees around the `activeVersionId` pointer flip.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use platform_core::errors::{RepositoryError, ValidationError};
use platform_core::job::{Job, JobStore};
use platform_core::object_store::ObjectStore;
use platform_core::tenancy::TenantScope;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use builder_domain::manifest::{Manifest, ManifestPage};
use builder_domain::model::{
    page_path_to_file, BuildJob, BuildJobStatus, Site, SiteVersion, SiteVersionStatus,
    MAX_BUILD_RETRIES,
};
use builder_domain::validation::validate_publishable;

use crate::render::render_404;
use crate::repository::{BuildJobRepository, PageRepository, SiteRepository, SiteVersionRepository};

pub const BUILD_QUEUE: &str = "builds";

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Build-job idempotency key: `build:{buildJobId}:{retryCount}`, distinct
/// from the step worker's `runId:stepKey:retryCount` grammar since a build
/// job has no step key (§4.2's key shape, adapted for a single-job queue).
fn build_idempotency_key(build_job_id: Uuid, retry_count: u32) -> String {
    format!("build:{build_job_id}:{retry_count}")
}

#[derive(Debug, Error)]
pub enum BuildEngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    ObjectStore(#[from] platform_core::errors::ObjectStoreError),
    #[error(transparent)]
    JobStore(#[from] platform_core::errors::JobStoreError),
}

pub struct BuildEngine {
    sites: Arc<dyn SiteRepository>,
    pages: Arc<dyn PageRepository>,
    versions: Arc<dyn SiteVersionRepository>,
    jobs: Arc<dyn BuildJobRepository>,
    job_store: Arc<dyn JobStore>,
    objects: Arc<dyn ObjectStore>,
}

impl BuildEngine {
    pub fn new(
        sites: Arc<dyn SiteRepository>,
        pages: Arc<dyn PageRepository>,
        versions: Arc<dyn SiteVersionRepository>,
        jobs: Arc<dyn BuildJobRepository>,
        job_store: Arc<dyn JobStore>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            sites,
            pages,
            versions,
            jobs,
            job_store,
            objects,
        }
    }

    /// `Publish(siteId, actorId)` (§4.4). Returns the newly created
    /// `SiteVersion` and `BuildJob`; the caller maps this to HTTP 202.
    pub async fn publish(
        &self,
        scope: TenantScope,
        site_id: Uuid,
    ) -> Result<(SiteVersion, BuildJob), BuildEngineError> {
        let site = self.sites.get(scope, site_id).await?;
        let pages = self.pages.list_for_site(site.id).await?;
        let published = pages.iter().filter(|p| p.is_published).count();
        validate_publishable(published)?;

        let next_version = self.versions.max_version(site.id).await? + 1;
        let prefix = SiteVersion::prefix_for(site.tenant_id, site.id, next_version);

        let version = SiteVersion {
            id: Uuid::new_v4(),
            site_id: site.id,
            tenant_id: site.tenant_id,
            version: next_version,
            artifact_prefix: prefix,
            status: SiteVersionStatus::Building,
            page_count: published as u32,
            asset_size: 0,
            manifest_hash: None,
            build_duration_ms: None,
            published_at: None,
            created_at: Utc::now(),
        };
        let version = self.versions.create(version).await?;

        let job = BuildJob {
            id: Uuid::new_v4(),
            site_version_id: version.id,
            tenant_id: site.tenant_id,
            status: BuildJobStatus::Queued,
            retry_count: 0,
            worker_id: None,
            error: None,
            started_at: None,
            completed_at: None,
        };
        let job = self.jobs.create(job).await?;

        let queue_job = Job::new(
            BUILD_QUEUE,
            "execute_build",
            build_idempotency_key(job.id, job.retry_count),
            serde_json::json!({ "buildJobId": job.id }),
        );
        self.job_store.enqueue(queue_job).await?;

        Ok((version, job))
    }

    /// `ExecuteBuild(buildJobId)` (§4.4), worker-side. Re-reads current
    /// published-page state on every attempt rather than building off an
    /// enqueue-time snapshot (§4.4 "Failure & retries", §9 open question).
    pub async fn execute_build(&self, build_job_id: Uuid) -> Result<Site, BuildEngineError> {
        let mut job = self.jobs.get(build_job_id).await?;
        job.status = BuildJobStatus::Processing;
        job.started_at = Some(Utc::now());
        job.worker_id = Some(format!("build-worker-{}", std::process::id()));
        let job = self.jobs.update(job).await?;

        match self.run_build(&job).await {
            Ok(site) => {
                let mut job = self.jobs.get(job.id).await?;
                job.status = BuildJobStatus::Completed;
                job.completed_at = Some(Utc::now());
                self.jobs.update(job).await?;
                Ok(site)
            }
            Err(err) => {
                self.fail_build(&job, &err.to_string()).await?;
                Err(err)
            }
        }
    }

    async fn run_build(&self, job: &BuildJob) -> Result<Site, BuildEngineError> {
        let version = self.versions.get(job.site_version_id).await?;
        let site = self
            .sites
            .get(TenantScope::new(version.tenant_id), version.site_id)
            .await?;

        let mut pages = self.pages.list_for_site(site.id).await?;
        pages.retain(|p| p.is_published);
        pages.sort_by_key(|p| p.sort_order);

        let mut manifest_pages = Vec::with_capacity(pages.len());
        let mut total_size: u64 = 0;
        for page in &pages {
            let html = crate::render::render_page(page, &site);
            let hash = sha256_hex(html.as_bytes());
            let file = page_path_to_file(&page.path);
            let key = platform_core::object_store::join_key(&version.artifact_prefix, &format!("/{file}"));
            let bytes = html.into_bytes();
            let size = bytes.len() as u64;
            self.objects
                .put(&key, bytes, "text/html; charset=utf-8")
                .await?;
            total_size += size;
            manifest_pages.push(ManifestPage {
                path: page.path.clone(),
                artifact_key: key,
                title: page.title.clone(),
                hash,
                size,
            });
        }

        let not_found_html = render_404(&site);
        let not_found_key =
            platform_core::object_store::join_key(&version.artifact_prefix, "/404.html");
        self.objects
            .put(
                &not_found_key,
                not_found_html.into_bytes(),
                "text/html; charset=utf-8",
            )
            .await?;

        let manifest = Manifest::new(
            version.version,
            site.id,
            site.tenant_id,
            manifest_pages,
            Vec::new(),
        );
        let manifest_bytes = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| BuildEngineError::JobStore(platform_core::errors::JobStoreError::Serialization(e)))?;
        let manifest_key =
            platform_core::object_store::join_key(&version.artifact_prefix, "/manifest.json");
        self.objects
            .put(&manifest_key, manifest_bytes, "application/json")
            .await?;

        self.activate_version(site, version, manifest, total_size)
            .await
    }

    async fn activate_version(
        &self,
        site: Site,
        mut version: SiteVersion,
        manifest: Manifest,
        total_size: u64,
    ) -> Result<Site, BuildEngineError> {
        let now = Utc::now();
        version.status = SiteVersionStatus::Ready;
        version.asset_size = total_size;
        version.manifest_hash = Some(manifest.checksum);
        version.published_at = Some(now);
        version.build_duration_ms = Some(
            now.signed_duration_since(version.created_at)
                .num_milliseconds()
                .max(0) as u64,
        );
        let version = self.versions.update(version).await?;

        if let Some(prior_id) = site.active_version_id {
            if prior_id != version.id {
                let mut prior = self.versions.get(prior_id).await?;
                prior.status = SiteVersionStatus::Superseded;
                self.versions.update(prior).await?;
            }
        }

        let mut site = site;
        site.active_version_id = Some(version.id);
        site.updated_at = Utc::now();
        let site = self.sites.update(site).await?;
        Ok(site)
    }

    async fn fail_build(&self, job: &BuildJob, message: &str) -> Result<(), BuildEngineError> {
        let version = self.versions.get(job.site_version_id).await?;
        let mut version = version;
        version.status = SiteVersionStatus::Failed;
        self.versions.update(version).await?;

        let mut job = self.jobs.get(job.id).await?;
        job.status = BuildJobStatus::Failed;
        job.error = Some(message.to_string());
        job.completed_at = Some(Utc::now());
        let requeue = job.retry_count < MAX_BUILD_RETRIES;
        let retry_count = job.retry_count;
        let job_id = job.id;
        self.jobs.update(job).await?;

        if requeue {
            let delay = Duration::from_secs(2u64.saturating_pow(retry_count + 1));
            let queue_job = Job::new(
                BUILD_QUEUE,
                "execute_build",
                build_idempotency_key(job_id, retry_count + 1),
                serde_json::json!({ "buildJobId": job_id }),
            );
            self.job_store.enqueue_delayed(queue_job, delay).await?;
        }
        Ok(())
    }

    /// `Rollback(siteId, targetVersionId)` (§4.4).
    pub async fn rollback(
        &self,
        scope: TenantScope,
        site_id: Uuid,
        target_version_id: Uuid,
    ) -> Result<Site, BuildEngineError> {
        let site = self.sites.get(scope, site_id).await?;
        let mut target = self.versions.get_for_site(site.id, target_version_id).await?;
        builder_domain::validation::validate_rollback_target(&site, &target)?;

        if target.status == SiteVersionStatus::Superseded {
            target.status = SiteVersionStatus::Ready;
            target = self.versions.update(target).await?;
        }

        if let Some(current_id) = site.active_version_id {
            if current_id != target.id {
                let mut current = self.versions.get(current_id).await?;
                current.status = SiteVersionStatus::Superseded;
                self.versions.update(current).await?;
            }
        }

        let mut site = site;
        site.active_version_id = Some(target.id);
        site.updated_at = Utc::now();
        let site = self.sites.update(site).await?;
        Ok(site)
    }
}

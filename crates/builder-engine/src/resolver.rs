//! Site resolver (§4.5): translates an incoming `(subdomain, requestPath)`
//! into artifact bytes, with a 30 s per-subdomain cache over the active
//! version pointer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;
use uuid::Uuid;

use platform_core::errors::RepositoryError;
use platform_core::object_store::{join_key, ObjectStore, StoredObject};

use crate::repository::SiteRepository;
use crate::repository::SiteVersionRepository;

const CACHE_TTL: Duration = Duration::from_secs(30);

fn asset_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.\w+$").unwrap())
}

#[derive(Debug, Clone)]
struct ActiveVersionEntry {
    artifact_prefix: String,
    version: u32,
    cached_at: Instant,
}

impl ActiveVersionEntry {
    fn is_fresh(&self) -> bool {
        self.cached_at.elapsed() < CACHE_TTL
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("site not found for subdomain")]
    SiteNotFound,
    #[error("site has no active version")]
    NoActiveVersion,
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    ObjectStore(#[from] platform_core::errors::ObjectStoreError),
}

pub struct ResolvedAsset {
    pub object: StoredObject,
    pub version: u32,
    pub cache_control: &'static str,
}

/// Caches the `(siteId, artifactPrefix, version)` triple per subdomain for
/// 30 s (§4.5 step 1); `invalidate` is called by the build engine on
/// publish/rollback so activation is visible without waiting out the TTL.
pub struct SiteResolver {
    sites: Arc<dyn SiteRepository>,
    versions: Arc<dyn SiteVersionRepository>,
    objects: Arc<dyn ObjectStore>,
    cache: DashMap<String, ActiveVersionEntry>,
}

impl SiteResolver {
    pub fn new(
        sites: Arc<dyn SiteRepository>,
        versions: Arc<dyn SiteVersionRepository>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            sites,
            versions,
            objects,
            cache: DashMap::new(),
        }
    }

    pub fn invalidate(&self, subdomain: &str) {
        self.cache.remove(subdomain);
    }

    async fn active_version(&self, subdomain: &str) -> Result<ActiveVersionEntry, ResolveError> {
        if let Some(entry) = self.cache.get(subdomain) {
            if entry.is_fresh() {
                return Ok(entry.value().clone());
            }
        }

        let site = self
            .sites
            .get_by_subdomain(subdomain)
            .await
            .map_err(|_| ResolveError::SiteNotFound)?;
        let active_id = site.active_version_id.ok_or(ResolveError::NoActiveVersion)?;
        let version = self.versions.get(active_id).await?;

        let entry = ActiveVersionEntry {
            artifact_prefix: version.artifact_prefix,
            version: version.version,
            cached_at: Instant::now(),
        };
        self.cache.insert(subdomain.to_string(), entry.clone());
        Ok(entry)
    }

    /// `request_path` is classified as a static asset when it ends in a
    /// file extension (`/.*\.\w+$`), else as a page (§4.5 step 2).
    pub async fn resolve(
        &self,
        subdomain: &str,
        request_path: &str,
    ) -> Result<ResolvedAsset, ResolveError> {
        let entry = self.active_version(subdomain).await?;
        let is_asset = asset_re().is_match(request_path);

        if is_asset {
            let key = join_key(&entry.artifact_prefix, request_path);
            let object = self.objects.get(&key).await?;
            return Ok(ResolvedAsset {
                object,
                version: entry.version,
                cache_control: "public, max-age=31536000, immutable",
            });
        }

        let page_file = if request_path == "/" || request_path.is_empty() {
            "/index.html".to_string()
        } else {
            format!("{}/index.html", request_path.trim_end_matches('/'))
        };
        let key = join_key(&entry.artifact_prefix, &page_file);

        match self.objects.get(&key).await {
            Ok(object) => Ok(ResolvedAsset {
                object,
                version: entry.version,
                cache_control: "public, max-age=60, s-maxage=300",
            }),
            Err(_) => {
                let not_found_key = join_key(&entry.artifact_prefix, "/404.html");
                let object = self
                    .objects
                    .get(&not_found_key)
                    .await
                    .map_err(|_| ResolveError::NotFound)?;
                Ok(ResolvedAsset {
                    object,
                    version: entry.version,
                    cache_control: "public, max-age=60, s-maxage=300",
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::in_memory::{InMemorySiteRepository, InMemorySiteVersionRepository};
    use builder_domain::model::{Site, SiteSettings, SiteVersion, SiteVersionStatus};
    use chrono::Utc;
    use platform_core::object_store::InMemoryObjectStore;

    async fn setup() -> (SiteResolver, String) {
        let sites = Arc::new(InMemorySiteRepository::new());
        let versions = Arc::new(InMemorySiteVersionRepository::new());
        let objects = Arc::new(InMemoryObjectStore::new());

        let site_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();
        let version_id = Uuid::new_v4();
        let prefix = SiteVersion::prefix_for(tenant_id, site_id, 1);

        versions
            .create(SiteVersion {
                id: version_id,
                site_id,
                tenant_id,
                version: 1,
                artifact_prefix: prefix.clone(),
                status: SiteVersionStatus::Ready,
                page_count: 1,
                asset_size: 0,
                manifest_hash: None,
                build_duration_ms: None,
                published_at: Some(Utc::now()),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        sites
            .create(Site {
                id: site_id,
                tenant_id,
                name: "Acme".into(),
                slug: "acme".into(),
                subdomain: "acme".into(),
                settings: SiteSettings::default(),
                active_version_id: Some(version_id),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();

        objects
            .put(
                &join_key(&prefix, "/index.html"),
                b"<html>home</html>".to_vec(),
                "text/html; charset=utf-8",
            )
            .await
            .unwrap();
        objects
            .put(
                &join_key(&prefix, "/404.html"),
                b"<html>missing</html>".to_vec(),
                "text/html; charset=utf-8",
            )
            .await
            .unwrap();
        objects
            .put(
                &join_key(&prefix, "/assets/app.css"),
                b"body{}".to_vec(),
                "text/css",
            )
            .await
            .unwrap();

        (SiteResolver::new(sites, versions, objects), "acme".to_string())
    }

    #[tokio::test]
    async fn resolves_root_page() {
        let (resolver, subdomain) = setup().await;
        let resolved = resolver.resolve(&subdomain, "/").await.unwrap();
        assert_eq!(resolved.object.bytes, b"<html>home</html>");
        assert_eq!(resolved.cache_control, "public, max-age=60, s-maxage=300");
    }

    #[tokio::test]
    async fn resolves_static_asset_with_immutable_cache_control() {
        let (resolver, subdomain) = setup().await;
        let resolved = resolver.resolve(&subdomain, "/assets/app.css").await.unwrap();
        assert_eq!(resolved.object.bytes, b"body{}");
        assert_eq!(
            resolved.cache_control,
            "public, max-age=31536000, immutable"
        );
    }

    #[tokio::test]
    async fn missing_page_falls_back_to_404_document() {
        let (resolver, subdomain) = setup().await;
        let resolved = resolver.resolve(&subdomain, "/nope").await.unwrap();
        assert_eq!(resolved.object.bytes, b"<html>missing</html>");
    }

    #[tokio::test]
    async fn unknown_subdomain_is_site_not_found() {
        let (resolver, _subdomain) = setup().await;
        let result = resolver.resolve("ghost", "/").await;
        assert!(matches!(result, Err(ResolveError::SiteNotFound)));
    }
}

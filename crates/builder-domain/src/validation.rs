//! Builder-domain validation (§3 invariants, §8 boundary behaviors).

use platform_core::errors::ValidationError;
use regex::Regex;
use std::sync::OnceLock;

use crate::model::{Site, SiteVersion, SiteVersionStatus};

fn path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^/[a-zA-Z0-9_\-/]*$").unwrap())
}

fn slug_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9-]*$").unwrap())
}

/// A page path must start with `/` and contain only URL-safe path segments
/// (§3 Page invariant "Path syntactically validated").
pub fn validate_page_path(path: &str) -> Result<(), ValidationError> {
    if !path.starts_with('/') {
        return Err(ValidationError::single("path", "must start with '/'"));
    }
    if path.len() > 1 && path.ends_with('/') {
        return Err(ValidationError::single(
            "path",
            "must not end with a trailing '/' except the root path",
        ));
    }
    if !path_re().is_match(path) {
        return Err(ValidationError::single(
            "path",
            "must contain only letters, digits, '-', and '/' segments",
        ));
    }
    Ok(())
}

/// Site `slug` and `subdomain` share the same lowercase-kebab grammar.
pub fn validate_slug(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || value.len() > 63 || !slug_re().is_match(value) {
        return Err(ValidationError::single(
            field,
            "must be lowercase alphanumeric with optional internal hyphens",
        ));
    }
    Ok(())
}

/// §4.4 Publish protocol step 1: "site exists, belongs to tenant, has ≥ 1
/// page." The existence/tenant checks happen at the repository lookup;
/// this only covers the page-count invariant, which is a pure function of
/// already-loaded data.
pub fn validate_publishable(published_page_count: usize) -> Result<(), ValidationError> {
    if published_page_count == 0 {
        return Err(ValidationError::single(
            "pages",
            "site has no published pages",
        ));
    }
    Ok(())
}

/// §4.4 Rollback: "Target must belong to Site and have status READY or
/// SUPERSEDED, else ValidationError."
pub fn validate_rollback_target(site: &Site, target: &SiteVersion) -> Result<(), ValidationError> {
    if target.site_id != site.id {
        return Err(ValidationError::single(
            "versionId",
            "version does not belong to this site",
        ));
    }
    match target.status {
        SiteVersionStatus::Ready | SiteVersionStatus::Superseded => Ok(()),
        SiteVersionStatus::Building | SiteVersionStatus::Failed => Err(ValidationError::single(
            "versionId",
            "cannot roll back to a version that is building or failed",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn version(status: SiteVersionStatus, site_id: uuid::Uuid) -> SiteVersion {
        SiteVersion {
            id: Uuid::new_v4(),
            site_id,
            tenant_id: Uuid::new_v4(),
            version: 1,
            artifact_prefix: "sites/t/s/1".into(),
            status,
            page_count: 1,
            asset_size: 0,
            manifest_hash: None,
            build_duration_ms: None,
            published_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn root_path_is_valid() {
        assert!(validate_page_path("/").is_ok());
    }

    #[test]
    fn nested_path_is_valid() {
        assert!(validate_page_path("/a/b").is_ok());
    }

    #[test]
    fn path_without_leading_slash_is_rejected() {
        assert!(validate_page_path("about").is_err());
    }

    #[test]
    fn path_with_trailing_slash_is_rejected() {
        assert!(validate_page_path("/about/").is_err());
    }

    #[test]
    fn publishing_with_zero_pages_is_rejected() {
        assert!(validate_publishable(0).is_err());
    }

    #[test]
    fn rollback_to_building_version_is_rejected() {
        let site_id = Uuid::new_v4();
        let site = Site {
            id: site_id,
            tenant_id: Uuid::new_v4(),
            name: "t".into(),
            slug: "t".into(),
            subdomain: "t".into(),
            settings: Default::default(),
            active_version_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let target = version(SiteVersionStatus::Building, site_id);
        assert!(validate_rollback_target(&site, &target).is_err());
    }

    #[test]
    fn rollback_to_superseded_version_is_allowed() {
        let site_id = Uuid::new_v4();
        let site = Site {
            id: site_id,
            tenant_id: Uuid::new_v4(),
            name: "t".into(),
            slug: "t".into(),
            subdomain: "t".into(),
            settings: Default::default(),
            active_version_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let target = version(SiteVersionStatus::Superseded, site_id);
        assert!(validate_rollback_target(&site, &target).is_ok());
    }
}

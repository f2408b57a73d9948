//! Builder-domain entities (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::content::PageContent;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ThemeSettings {
    #[serde(default)]
    pub color_primary: Option<String>,
    #[serde(default)]
    pub color_secondary: Option<String>,
    #[serde(default)]
    pub color_bg: Option<String>,
    #[serde(default)]
    pub color_text: Option<String>,
    #[serde(default)]
    pub font_heading: Option<String>,
    #[serde(default)]
    pub font_body: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavItem {
    pub label: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FooterSettings {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub links: Vec<NavItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SiteSettings {
    #[serde(default)]
    pub theme: ThemeSettings,
    #[serde(default)]
    pub nav: Vec<NavItem>,
    #[serde(default)]
    pub footer: Option<FooterSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub slug: String,
    pub subdomain: String,
    pub settings: SiteSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_version_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: Uuid,
    pub site_id: Uuid,
    pub path: String,
    pub title: String,
    pub content: PageContent,
    #[serde(default)]
    pub seo_title: Option<String>,
    #[serde(default)]
    pub seo_description: Option<String>,
    pub is_published: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SiteVersionStatus {
    Building,
    Ready,
    Failed,
    Superseded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteVersion {
    pub id: Uuid,
    pub site_id: Uuid,
    pub tenant_id: Uuid,
    pub version: u32,
    pub artifact_prefix: String,
    pub status: SiteVersionStatus,
    pub page_count: u32,
    pub asset_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SiteVersion {
    /// `sites/{tenantId}/{siteId}/{version}` (§4.4 step 3).
    pub fn prefix_for(tenant_id: Uuid, site_id: Uuid, version: u32) -> String {
        format!("sites/{tenant_id}/{site_id}/{version}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildJobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildJob {
    pub id: Uuid,
    pub site_version_id: Uuid,
    pub tenant_id: Uuid,
    pub status: BuildJobStatus,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Maximum `BuildJob.retryCount` before a build is surfaced as failed
/// (§4.4 "Failure & retries", mirroring the workflow engine's default).
pub const MAX_BUILD_RETRIES: u32 = 3;

/// `pagePathToFile("/") = "index.html"`; `pagePathToFile("/a/b") =
/// "a/b/index.html"` (§4.4 step 3).
pub fn page_path_to_file(path: &str) -> String {
    let trimmed = path.trim_start_matches('/').trim_end_matches('/');
    if trimmed.is_empty() {
        "index.html".to_string()
    } else {
        format!("{trimmed}/index.html")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_path_maps_to_index() {
        assert_eq!(page_path_to_file("/"), "index.html");
    }

    #[test]
    fn nested_path_maps_to_nested_index() {
        assert_eq!(page_path_to_file("/a/b"), "a/b/index.html");
    }

    #[test]
    fn trailing_slash_is_normalized() {
        assert_eq!(page_path_to_file("/about/"), "about/index.html");
    }
}

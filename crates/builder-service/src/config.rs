//! Environment configuration for the builder service binary (§6).

use platform_core::config::{CommonConfig, EnvReader};
use platform_core::errors::ConfigError;

pub const DEFAULT_PORT: u16 = 4100;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub common: CommonConfig,
    /// Filesystem root for the `FsObjectStore` reference adapter (§1 "the
    /// concrete relational/KV engines are out of scope"; the object store
    /// gets the same treatment, local-disk here rather than S3).
    pub object_store_path: String,
    /// Optional CDN origin prepended to asset URLs in rendered pages; when
    /// unset the renderer serves assets straight off `/serve`.
    pub cdn_base_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut reader = EnvReader::new();
        let common = CommonConfig::load(&mut reader, DEFAULT_PORT);
        let object_store_path = reader.optional_or("OBJECT_STORE_PATH", "./data/objects");
        let cdn_base_url = reader.optional("CDN_BASE_URL");
        reader.finish()?;
        Ok(Self {
            common,
            object_store_path,
            cdn_base_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "mutates process-wide environment; run with --ignored --test-threads=1"]
    fn missing_required_vars_collects_every_issue() {
        for key in ["DATABASE_URL", "KV_URL", "JWT_SECRET"] {
            std::env::remove_var(key);
        }
        let err = AppConfig::from_env().unwrap_err();
        assert!(err.issues.len() >= 3);
    }
}

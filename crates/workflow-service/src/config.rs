//! Environment configuration for the workflow service binary (§6).

use platform_core::config::{CommonConfig, EnvReader};
use platform_core::errors::ConfigError;

pub const DEFAULT_PORT: u16 = 4000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub common: CommonConfig,
    pub completion_api_key: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut reader = EnvReader::new();
        let common = CommonConfig::load(&mut reader, DEFAULT_PORT);
        let completion_api_key = reader.optional("COMPLETION_API_KEY");
        reader.finish()?;
        Ok(Self {
            common,
            completion_api_key,
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

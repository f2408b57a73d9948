//! Environment-backed configuration loading (§6).
//!
//! `EnvReader` accumulates every missing or malformed option instead of
//! bailing on the first, so `AppConfig::from_env()` in each service binary
//! can report a complete list of what's wrong in a single failure.

use std::env;
use std::str::FromStr;

use crate::errors::ConfigError;

#[derive(Debug, Default)]
pub struct EnvReader {
    issues: Vec<String>,
}

impl EnvReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a required string variable, recording an issue if absent or empty.
    pub fn require(&mut self, key: &str) -> String {
        match env::var(key) {
            Ok(v) if !v.is_empty() => v,
            Ok(_) => {
                self.issues.push(format!("{key} must not be empty"));
                String::new()
            }
            Err(_) => {
                self.issues.push(format!("{key} is required"));
                String::new()
            }
        }
    }

    /// Read a required string variable and check a minimum length.
    pub fn require_min_len(&mut self, key: &str, min_len: usize) -> String {
        let value = self.require(key);
        if !value.is_empty() && value.len() < min_len {
            self.issues
                .push(format!("{key} must be at least {min_len} characters"));
        }
        value
    }

    /// Read an optional string variable.
    pub fn optional(&mut self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.is_empty())
    }

    /// Read an optional string variable with a default.
    pub fn optional_or(&mut self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse an optional value of type `T`, recording an issue on parse failure.
    pub fn optional_parsed<T: FromStr>(&mut self, key: &str, default: T) -> T {
        match env::var(key) {
            Ok(raw) if !raw.is_empty() => raw.parse().unwrap_or_else(|_| {
                self.issues
                    .push(format!("{key} is not a valid value: {raw}"));
                default
            }),
            _ => default,
        }
    }

    /// Parse a value that must be one of `choices`.
    pub fn enum_or(&mut self, key: &str, choices: &[&str], default: &str) -> String {
        match env::var(key) {
            Ok(raw) if choices.contains(&raw.as_str()) => raw,
            Ok(raw) if raw.is_empty() => default.to_string(),
            Ok(raw) => {
                self.issues.push(format!(
                    "{key} must be one of {choices:?}, got {raw:?}"
                ));
                default.to_string()
            }
            Err(_) => default.to_string(),
        }
    }

    /// Finalize the reader into a `ConfigError` if any issues were recorded.
    pub fn finish(self) -> Result<(), ConfigError> {
        match ConfigError::from_issues(self.issues) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn issues(&self) -> &[String] {
        &self.issues
    }
}

/// Shared fields every service config needs, per the §6 configuration table.
#[derive(Debug, Clone)]
pub struct CommonConfig {
    pub database_url: String,
    pub kv_url: String,
    pub jwt_secret: String,
    pub port: u16,
    pub env: Environment,
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    fn from_str_lenient(s: &str) -> Self {
        match s {
            "production" => Environment::Production,
            "test" => Environment::Test,
            _ => Environment::Development,
        }
    }
}

impl CommonConfig {
    pub fn load(reader: &mut EnvReader, default_port: u16) -> Self {
        let database_url = reader.require("DATABASE_URL");
        let kv_url = reader.require("KV_URL");
        let jwt_secret = reader.require_min_len("JWT_SECRET", 8);
        let port = reader.optional_parsed("PORT", default_port);
        let env = Environment::from_str_lenient(&reader.enum_or(
            "ENV",
            &["development", "production", "test"],
            "development",
        ));
        let log_level = reader.enum_or(
            "LOG_LEVEL",
            &["fatal", "error", "warn", "info", "debug", "trace"],
            "info",
        );
        Self {
            database_url,
            kv_url,
            jwt_secret,
            port,
            env,
            log_level,
        }
    }
}

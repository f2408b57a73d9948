//! Error taxonomy for the whole platform (§7).
//!
//! Three layered enums cover the three cross-cutting subsystems most of the
//! domain crates build on:
//! - `RepositoryError` — relational/object store failures
//! - `JobStoreError` — durable queue failures
//! - `ConfigError` — startup configuration failures
//!
//! Service crates define their own `ApiError` that wraps these (plus
//! domain-specific variants) and maps to the §7 `ErrorCode` table.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The stable wire taxonomy from §7. Each service's `ApiError` maps onto
/// exactly one of these when it serializes the error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    AuthError,
    Forbidden,
    NotFound,
    Conflict,
    RateLimit,
    BuildError,
    InternalError,
}

impl ErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 400,
            ErrorCode::AuthError => 401,
            ErrorCode::Forbidden => 403,
            ErrorCode::NotFound => 404,
            ErrorCode::Conflict => 409,
            ErrorCode::RateLimit => 429,
            ErrorCode::BuildError => 500,
            ErrorCode::InternalError => 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorBody,
}

impl ErrorEnvelope {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorBody {
                code,
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.error.details = Some(details);
        self
    }
}

/// Failures from the relational or object-store repository layer.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("uniqueness violation: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("internal store error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound(e.to_string()),
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                RepositoryError::Conflict(e.to_string())
            }
            _ => RepositoryError::Internal(e.to_string()),
        }
    }
}

/// Failures from the durable job queue.
#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("job store unavailable: {0}")]
    Unavailable(String),

    #[error("job serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal job store error: {0}")]
    Internal(String),
}

/// Failures reading or writing the artifact store.
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("object store io error: {0}")]
    Io(String),
}

/// Aggregated startup configuration failure; collects every missing or
/// invalid option in one pass rather than failing on the first.
#[derive(Debug, Error)]
#[error("invalid configuration:\n{}", .issues.join("\n"))]
pub struct ConfigError {
    pub issues: Vec<String>,
}

impl ConfigError {
    pub fn from_issues(issues: Vec<String>) -> Option<Self> {
        if issues.is_empty() {
            None
        } else {
            Some(Self { issues })
        }
    }
}

/// Authentication/token failures surfaced by the auth guard.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("invalid credentials")]
    InvalidCredentials,
}

/// Validation failures from the schema/graph validator (§7 `VALIDATION_ERROR`).
#[derive(Debug, Error)]
#[error("validation failed")]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldViolation {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            violations: vec![FieldViolation {
                path: path.into(),
                message: message.into(),
            }],
        }
    }

    pub fn details(&self) -> serde_json::Value {
        serde_json::to_value(&self.violations).unwrap_or(serde_json::Value::Null)
    }
}

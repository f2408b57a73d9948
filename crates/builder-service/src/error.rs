//! `ApiError` (§7): maps every failure surfaced by a handler onto the
//! stable `{success:false, error:{code,message,details?}}` envelope.
//!
//! Mirrors `workflow-service::error::ApiError`, generalized to the build
//! engine's and site resolver's error types in place of the run engine's.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use builder_engine::build::BuildEngineError;
use builder_engine::resolver::ResolveError;
use platform_core::errors::{AuthError, ConfigError, ErrorCode, ErrorEnvelope, RepositoryError, ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Build(#[from] BuildEngineError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("rate limit exceeded")]
    RateLimit,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn code_and_message(&self, dev_mode: bool) -> (ErrorCode, String) {
        match self {
            ApiError::Validation(e) => (ErrorCode::ValidationError, e.to_string()),
            ApiError::Auth(_) => (ErrorCode::AuthError, "authentication failed".into()),
            ApiError::Forbidden(msg) => (ErrorCode::Forbidden, msg.clone()),
            ApiError::NotFound(msg) => (ErrorCode::NotFound, msg.clone()),
            ApiError::Repository(RepositoryError::NotFound(msg)) => (ErrorCode::NotFound, msg.clone()),
            ApiError::Repository(RepositoryError::Conflict(msg)) => (ErrorCode::Conflict, msg.clone()),
            ApiError::Repository(e) => (
                ErrorCode::InternalError,
                if dev_mode { e.to_string() } else { "internal error".into() },
            ),
            ApiError::Build(BuildEngineError::Validation(e)) => (ErrorCode::ValidationError, e.to_string()),
            ApiError::Build(BuildEngineError::Repository(RepositoryError::NotFound(msg))) => {
                (ErrorCode::NotFound, msg.clone())
            }
            ApiError::Build(e) => (
                ErrorCode::BuildError,
                if dev_mode { e.to_string() } else { "build failed".into() },
            ),
            ApiError::Resolve(ResolveError::SiteNotFound)
            | ApiError::Resolve(ResolveError::NoActiveVersion)
            | ApiError::Resolve(ResolveError::NotFound) => (ErrorCode::NotFound, "not found".into()),
            ApiError::Resolve(e) => (
                ErrorCode::InternalError,
                if dev_mode { e.to_string() } else { "internal error".into() },
            ),
            ApiError::RateLimit => (ErrorCode::RateLimit, "rate limit exceeded".into()),
            ApiError::Internal(e) => (
                ErrorCode::InternalError,
                if dev_mode { e.to_string() } else { "internal error".into() },
            ),
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::Validation(e) => Some(e.details()),
            ApiError::Build(BuildEngineError::Validation(e)) => Some(e.details()),
            _ => None,
        }
    }
}

/// Non-2xx client errors log at `warn`; 5xx log at `error` (§7
/// "Propagation"). `dev_mode` hides internal detail in production, as
/// §7's "Store errors" note for `INTERNAL_ERROR` requires.
pub fn render(err: ApiError, dev_mode: bool) -> Response {
    let (code, message) = err.code_and_message(dev_mode);
    let status = StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    } else {
        tracing::warn!(error = %err, "request rejected");
    }
    let mut envelope = ErrorEnvelope::new(code, message);
    if let Some(details) = err.details() {
        envelope = envelope.with_details(details);
    }
    (status, Json(envelope)).into_response()
}

impl From<ConfigError> for ApiError {
    fn from(e: ConfigError) -> Self {
        ApiError::Internal(anyhow::anyhow!(e))
    }
}

/// Handlers return `Result<_, ApiError>` directly; axum needs `IntoResponse`
/// on the error arm. Defaults to production-safe rendering (hides internal
/// detail) since the extractor has no route to the request's `AppConfig`.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        render(self, false)
    }
}

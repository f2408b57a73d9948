//! Auth guard (§4.7): every non-auth endpoint requires a bearer token; the
//! guard rejects missing/invalid tokens with `AUTH_ERROR` and populates
//! `(tenantId, userId, role)` on the request via this extractor.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use platform_core::errors::AuthError;
use platform_core::tenancy::{Role, TenantScope};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthContext {
    pub fn scope(&self) -> TenantScope {
        TenantScope::new(self.tenant_id)
    }
}

fn extract_bearer(parts: &Parts) -> Result<&str, AuthError> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingToken)?;
    header.strip_prefix("Bearer ").ok_or(AuthError::MissingToken)
}

impl FromRequestParts<SharedState> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let token = extract_bearer(parts)?;
        let claims = state.tokens.verify(token)?;
        Ok(AuthContext {
            tenant_id: claims.tenant_id,
            user_id: claims.sub,
            role: claims.role,
        })
    }
}

/// Used by the `/ws?token=` upgrade, which cannot carry an `Authorization`
/// header (§4.3 "authenticates once at connect time").
pub fn verify_query_token(state: &SharedState, token: &str) -> Result<AuthContext, ApiError> {
    let claims = state.tokens.verify(token)?;
    Ok(AuthContext {
        tenant_id: claims.tenant_id,
        user_id: claims.sub,
        role: claims.role,
    })
}

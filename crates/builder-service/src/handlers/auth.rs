//! `POST /auth/register`, `POST /auth/login` (§6).

use axum::extract::State;
use axum::Json;
use platform_core::accounts::new_tenant_and_owner;
use platform_core::auth::{hash_password, verify_password};
use platform_core::errors::{AuthError, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub tenant_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
}

fn slugify(name: &str) -> String {
    let slug: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        slug
    }
}

fn validate_register(req: &RegisterRequest) -> Result<(), ValidationError> {
    let mut violations = Vec::new();
    if req.tenant_name.trim().is_empty() {
        violations.push(("tenantName", "must not be empty"));
    }
    if !req.email.contains('@') {
        violations.push(("email", "must be a valid email address"));
    }
    if req.password.len() < 8 {
        violations.push(("password", "must be at least 8 characters"));
    }
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError {
            violations: violations
                .into_iter()
                .map(|(path, message)| platform_core::errors::FieldViolation {
                    path: path.to_string(),
                    message: message.to_string(),
                })
                .collect(),
        })
    }
}

pub async fn register(
    State(state): State<SharedState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    validate_register(&req)?;
    let password_hash = hash_password(&req.password).map_err(ApiError::Auth)?;
    let (tenant, user) = new_tenant_and_owner(
        req.tenant_name.clone(),
        slugify(&req.tenant_name),
        req.email,
        password_hash,
    );
    let tenant = state.accounts.create_tenant(tenant).await?;
    let user = state.accounts.create_user(user).await?;
    let token = state
        .tokens
        .issue(user.id, tenant.id, user.role)
        .map_err(ApiError::Auth)?;
    Ok(Json(AuthResponse {
        token,
        tenant_id: tenant.id,
        user_id: user.id,
    }))
}

pub async fn login(
    State(state): State<SharedState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = state
        .accounts
        .get_user_by_email(&req.email)
        .await
        .map_err(|_| ApiError::Auth(AuthError::InvalidCredentials))?;
    verify_password(&req.password, &user.password_hash).map_err(ApiError::Auth)?;
    let token = state
        .tokens
        .issue(user.id, user.tenant_id, user.role)
        .map_err(ApiError::Auth)?;
    Ok(Json(AuthResponse {
        token,
        tenant_id: user.tenant_id,
        user_id: user.id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_lowercases_and_dashes() {
        assert_eq!(slugify("Acme Corp!"), "acme-corp");
    }

    #[test]
    fn validate_register_rejects_short_password() {
        let req = RegisterRequest {
            tenant_name: "Acme".into(),
            email: "a@b.test".into(),
            password: "short".into(),
        };
        assert!(validate_register(&req).is_err());
    }
}

//! Bearer-token issuance/verification and password hashing.
//!
//! HTTP parsing and the JWT/argon2 primitives themselves are the "assumed
//! provided" collaborators named in §1; this module is the thin seam the
//! rest of the platform calls through.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AuthError;
use crate::tenancy::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub tenant_id: Uuid,
    pub role: Role,
    pub exp: i64,
}

/// Default token lifetime; tokens are intentionally short-lived since the
/// push bus (§4.3) treats them as throwaway connect-time credentials.
pub const TOKEN_TTL_HOURS: i64 = 24;

pub struct TokenIssuer {
    secret: String,
}

impl TokenIssuer {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn issue(&self, user_id: Uuid, tenant_id: Uuid, role: Role) -> Result<String, AuthError> {
        let claims = Claims {
            sub: user_id,
            tenant_id,
            role,
            exp: (Utc::now() + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|_| AuthError::InvalidToken)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|_| AuthError::InvalidToken)
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|_| AuthError::InvalidCredentials)
}

pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issues_and_verifies_roundtrip() {
        let issuer = TokenIssuer::new("a-long-enough-secret");
        let user_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();
        let token = issuer.issue(user_id, tenant_id, Role::Admin).unwrap();
        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.tenant_id, tenant_id);
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn rejects_token_signed_with_different_secret() {
        let issuer_a = TokenIssuer::new("secret-one-secret-one");
        let issuer_b = TokenIssuer::new("secret-two-secret-two");
        let token = issuer_a
            .issue(Uuid::new_v4(), Uuid::new_v4(), Role::Member)
            .unwrap();
        assert!(issuer_b.verify(&token).is_err());
    }

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash).is_ok());
        assert!(verify_password("wrong password", &hash).is_err());
    }
}

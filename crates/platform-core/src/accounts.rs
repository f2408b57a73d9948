//! Tenant/User repositories backing `/auth/register` and `/auth/login`
//! (EXPANSION §3 ambient entities). Both services embed the same account
//! model; each binary wires its own `AccountsRepository` instance so the
//! workflow and builder services never share a tenant table at runtime,
//! matching the "independent services" framing of §1.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::RepositoryError;
use crate::tenancy::{Role, Tenant, User};

#[async_trait]
pub trait AccountsRepository: Send + Sync {
    async fn create_tenant(&self, tenant: Tenant) -> Result<Tenant, RepositoryError>;
    async fn create_user(&self, user: User) -> Result<User, RepositoryError>;
    async fn get_user_by_email(&self, tenant_slug_or_email: &str) -> Result<User, RepositoryError>;
    async fn get_user_by_id(&self, id: Uuid) -> Result<User, RepositoryError>;
    async fn get_tenant(&self, id: Uuid) -> Result<Tenant, RepositoryError>;
}

/// In-memory reference adapter (§8 test tooling); a real deployment backs
/// this with the relational store via `platform_core::sqlite`.
#[derive(Default)]
pub struct InMemoryAccountsRepository {
    tenants: std::sync::RwLock<std::collections::HashMap<Uuid, Tenant>>,
    users: std::sync::RwLock<std::collections::HashMap<Uuid, User>>,
}

impl InMemoryAccountsRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountsRepository for InMemoryAccountsRepository {
    async fn create_tenant(&self, tenant: Tenant) -> Result<Tenant, RepositoryError> {
        let mut guard = self.tenants.write().unwrap();
        if guard.values().any(|t| t.slug == tenant.slug) {
            return Err(RepositoryError::Conflict(format!(
                "tenant slug {} already in use",
                tenant.slug
            )));
        }
        guard.insert(tenant.id, tenant.clone());
        Ok(tenant)
    }

    async fn create_user(&self, user: User) -> Result<User, RepositoryError> {
        let mut guard = self.users.write().unwrap();
        if guard
            .values()
            .any(|u| u.tenant_id == user.tenant_id && u.email == user.email)
        {
            return Err(RepositoryError::Conflict(format!(
                "email {} already registered for this tenant",
                user.email
            )));
        }
        guard.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, RepositoryError> {
        self.users
            .read()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("user with email {email}")))
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<User, RepositoryError> {
        self.users
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("user {id}")))
    }

    async fn get_tenant(&self, id: Uuid) -> Result<Tenant, RepositoryError> {
        self.tenants
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("tenant {id}")))
    }
}

/// Builds the `Tenant` + owning `User{role: OWNER}` pair for
/// `POST /auth/register` (EXPANSION §6 "auth endpoints detail").
pub fn new_tenant_and_owner(
    tenant_name: String,
    tenant_slug: String,
    email: String,
    password_hash: String,
) -> (Tenant, User) {
    let now: DateTime<Utc> = Utc::now();
    let tenant = Tenant {
        id: Uuid::new_v4(),
        name: tenant_name,
        slug: tenant_slug,
        created_at: now,
    };
    let user = User {
        id: Uuid::new_v4(),
        tenant_id: tenant.id,
        email,
        password_hash,
        role: Role::Owner,
        created_at: now,
    };
    (tenant, user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_then_lookup_roundtrips() {
        let repo = InMemoryAccountsRepository::new();
        let (tenant, user) = new_tenant_and_owner(
            "Acme".into(),
            "acme".into(),
            "owner@acme.test".into(),
            "hash".into(),
        );
        repo.create_tenant(tenant.clone()).await.unwrap();
        repo.create_user(user.clone()).await.unwrap();

        let found = repo.get_user_by_email("owner@acme.test").await.unwrap();
        assert_eq!(found.id, user.id);
        let found_tenant = repo.get_tenant(tenant.id).await.unwrap();
        assert_eq!(found_tenant.slug, "acme");
    }

    #[tokio::test]
    async fn duplicate_slug_is_conflict() {
        let repo = InMemoryAccountsRepository::new();
        let (t1, _) = new_tenant_and_owner("A".into(), "dup".into(), "a@x.test".into(), "h".into());
        let (t2, _) = new_tenant_and_owner("B".into(), "dup".into(), "b@x.test".into(), "h".into());
        repo.create_tenant(t1).await.unwrap();
        assert!(matches!(
            repo.create_tenant(t2).await,
            Err(RepositoryError::Conflict(_))
        ));
    }
}

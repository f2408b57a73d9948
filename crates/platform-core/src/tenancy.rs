//! Core tenancy types shared by both services.
//!
//! Every persisted entity in the system carries a `tenant_id`; repositories
//! are expected to thread it through every query (property 1, §8).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

/// Authorization role, coarse-grained per EXPANSION §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Admin,
    Member,
}

impl Role {
    /// Whether this role may delete or structurally modify tenant resources.
    pub fn can_manage(&self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// The identity resolved by the auth guard and threaded through handlers.
///
/// Every repository call takes a `TenantScope` (or derives one) so the
/// tenant predicate can never be forgotten at a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantScope {
    pub tenant_id: Uuid,
}

impl TenantScope {
    pub fn new(tenant_id: Uuid) -> Self {
        Self { tenant_id }
    }
}

/// The actor behind a request or worker-initiated transition, attached to
/// audit events so they survive user deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditActor {
    pub tenant_id: Uuid,
    pub user_id: Option<Uuid>,
    pub role: Option<Role>,
}

impl AuditActor {
    pub fn system(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            user_id: None,
            role: None,
        }
    }

    pub fn scope(&self) -> TenantScope {
        TenantScope::new(self.tenant_id)
    }
}

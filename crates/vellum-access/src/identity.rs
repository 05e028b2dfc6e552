//! Identity types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Tenant identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    /// Cross-tenant administrator.
    pub const SUPER_ADMIN: &'static str = "super_admin";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// The identity half of a cache key: which tenant and role a grant was
/// resolved for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccessScope {
    pub tenant: Option<TenantId>,
    pub role: Role,
}

impl fmt::Display for AccessScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tenant {
            Some(tenant) => write!(f, "{}/{}", tenant, self.role),
            None => write!(f, "*/{}", self.role),
        }
    }
}

/// Authenticated user context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    /// `None` for cross-tenant super-admins.
    pub tenant_id: Option<TenantId>,
    pub role: Role,
    /// Permission keys assigned directly by the auth provider.
    pub assigned_permissions: BTreeSet<String>,
}

impl Identity {
    pub fn new(user_id: Uuid, role: impl Into<Role>) -> Self {
        Self {
            user_id,
            email: String::new(),
            tenant_id: None,
            role: role.into(),
            assigned_permissions: BTreeSet::new(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant_id = Some(TenantId::new(tenant));
        self
    }

    pub fn with_permission(mut self, key: impl Into<String>) -> Self {
        self.assigned_permissions.insert(key.into());
        self
    }

    /// Scope grants are cached under.
    pub fn scope(&self) -> AccessScope {
        AccessScope {
            tenant: self.tenant_id.clone(),
            role: self.role.clone(),
        }
    }

    /// Check if the user holds a specific role.
    pub fn has_role(&self, role: &str) -> bool {
        self.role.as_str() == role
    }

    /// Check if the provider assigned a permission key to the user.
    pub fn has_permission(&self, key: &str) -> bool {
        self.assigned_permissions.contains(key)
    }

    /// Whether switching from `self` to `other` must invalidate cached grants.
    pub fn changes_scope(&self, other: &Identity) -> bool {
        self.role != other.role || self.tenant_id != other.tenant_id
    }
}

/// Application metadata carried in a session token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppMetadata {
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Decoded session token claims, as issued by the auth backend.
///
/// Signature verification belongs to the backend; this only maps an already
/// trusted payload onto an [`Identity`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user ID).
    pub sub: String,
    #[serde(default)]
    pub email: String,
    /// Expiration timestamp.
    pub exp: i64,
    #[serde(default)]
    pub app_metadata: AppMetadata,
}

impl SessionClaims {
    /// Check if the token is expired.
    pub fn is_expired(&self) -> bool {
        chrono::Utc::now().timestamp() > self.exp
    }

    /// Build an identity. Returns `None` for a malformed subject, a missing
    /// role or an expired token.
    pub fn into_identity(self) -> Option<Identity> {
        if self.is_expired() {
            return None;
        }
        let user_id = Uuid::parse_str(&self.sub).ok()?;
        let role = self.app_metadata.role?;
        Some(Identity {
            user_id,
            email: self.email,
            tenant_id: self.app_metadata.tenant_id.map(TenantId::new),
            role: Role::new(role),
            assigned_permissions: self.app_metadata.permissions.into_iter().collect(),
        })
    }
}

//! Configuration types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VellumConfig {
    /// Permission evaluation settings.
    pub access: AccessConfig,
    /// Where permission records come from.
    pub source: SourceConfig,
    /// Route guard navigation targets.
    pub routes: RouteConfig,
}

/// Permission evaluation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Roles granted every permission that has no explicit record.
    pub override_roles: Vec<String>,
    /// Per-fetch timeout in milliseconds. A timed out fetch resolves denied.
    pub fetch_timeout_ms: u64,
    /// Emit an audit event for every resolved decision.
    pub audit_decisions: bool,
}

impl AccessConfig {
    /// Fetch timeout as a [`Duration`].
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            override_roles: vec!["super_admin".to_string()],
            fetch_timeout_ms: 5000,
            audit_decisions: true,
        }
    }
}

/// Permission source kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Supabase/PostgREST backend.
    Rest,
    /// In-memory policy, from `policy_file` or the built-in CRM roles.
    #[default]
    Static,
}

/// Permission source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Source kind.
    pub kind: SourceKind,
    /// Backend base URL (rest only).
    pub url: Option<String>,
    /// Backend API key, sent as `apikey` and bearer token (rest only).
    pub api_key: Option<String>,
    /// RPC function answering single permission checks.
    pub check_function: String,
    /// Table queried when pre-warming a page.
    pub permissions_table: String,
    /// Static policy YAML (static only).
    pub policy_file: Option<PathBuf>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            url: None,
            api_key: None,
            check_function: "check_element_permission".to_string(),
            permissions_table: "element_permissions".to_string(),
            policy_file: None,
        }
    }
}

/// What the route guard does when an authenticated user lacks access.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyBehavior {
    /// Render an access denied view in place.
    #[default]
    Render,
    /// Navigate to `unauthorized_path`.
    Redirect,
}

/// Route guard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Login page.
    pub login_path: String,
    /// Unauthorized page.
    pub unauthorized_path: String,
    /// Denial handling.
    pub deny_behavior: DenyBehavior,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            unauthorized_path: "/unauthorized".to_string(),
            deny_behavior: DenyBehavior::default(),
        }
    }
}

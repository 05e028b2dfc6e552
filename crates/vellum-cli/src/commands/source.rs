//! Shared wiring: permission source, evaluator and identity from the
//! command line.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tracing::debug;
use uuid::Uuid;
use vellum_access::{
    EvaluatorConfig, Identity, PermissionEvaluator, PermissionSource, RestPermissionSource,
    StaticPermissionSource,
};
use vellum_common_config::{SourceConfig, SourceKind, VellumConfig};

use crate::error::CliError;

/// Who the permission is evaluated for
#[derive(Debug, Clone, Args)]
pub struct IdentityArgs {
    /// Role to evaluate as
    #[arg(short, long)]
    pub role: String,

    /// Tenant (organization) id; omit for global records only
    #[arg(short, long)]
    pub tenant: Option<String>,

    /// User id recorded in audit events
    #[arg(long)]
    pub user: Option<Uuid>,
}

impl IdentityArgs {
    pub fn identity(&self) -> Identity {
        let identity = Identity::new(self.user.unwrap_or_else(Uuid::new_v4), self.role.as_str());
        match &self.tenant {
            Some(tenant) => identity.with_tenant(tenant.as_str()),
            None => identity,
        }
    }
}

/// Build the configured permission source.
pub fn build_source(
    config: &SourceConfig,
    timeout: Duration,
) -> Result<Arc<dyn PermissionSource>, CliError> {
    match config.kind {
        SourceKind::Static => {
            let policy = match &config.policy_file {
                Some(path) => {
                    debug!(path = %path.display(), "loading static policy");
                    StaticPermissionSource::from_file(path)?
                }
                None => StaticPermissionSource::crm_defaults(),
            };
            Ok(Arc::new(policy))
        }
        SourceKind::Rest => {
            if config.url.is_none() {
                return Err(CliError::config_with_hint(
                    "source.url is required for the rest source",
                    "Set source.url (for example ${SUPABASE_URL}) in .vellum/config.yaml",
                ));
            }
            Ok(Arc::new(RestPermissionSource::from_config(config, timeout)?))
        }
    }
}

/// Build an evaluator over the configured source.
pub fn build_evaluator(config: &VellumConfig) -> Result<PermissionEvaluator, CliError> {
    let evaluator_config = EvaluatorConfig::from(&config.access);
    let source = build_source(&config.source, evaluator_config.fetch_timeout)?;
    Ok(PermissionEvaluator::new(source, evaluator_config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_access::{GrantState, Role, TenantId};

    #[test]
    fn test_identity_from_args() {
        let args = IdentityArgs {
            role: "support".to_string(),
            tenant: Some("acme".to_string()),
            user: None,
        };
        let identity = args.identity();

        assert_eq!(identity.role, Role::new("support"));
        assert_eq!(identity.tenant_id, Some(TenantId::new("acme")));
    }

    #[tokio::test]
    async fn test_default_config_uses_builtin_policy() {
        let evaluator = build_evaluator(&VellumConfig::default()).unwrap();
        let viewer = IdentityArgs {
            role: "viewer".to_string(),
            tenant: None,
            user: None,
        }
        .identity();

        let resolution = evaluator
            .resolve_permission(&viewer, "crm:customer", "read")
            .await
            .unwrap();
        assert_eq!(resolution.state(), GrantState::Granted);
    }

    #[test]
    fn test_rest_source_without_url_is_rejected() {
        let config = SourceConfig {
            kind: SourceKind::Rest,
            ..SourceConfig::default()
        };
        let err = build_source(&config, Duration::from_secs(1)).err().unwrap();
        assert_eq!(err.code(), "E001");
    }
}

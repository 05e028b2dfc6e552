//! Configuration types for Vellum.
//!
//! This crate provides the configuration types used by Vellum
//! for `.vellum/config.yaml` files.

pub mod env;
pub mod loader;
pub mod types;

pub use env::*;
pub use loader::*;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_sensible_values() {
        let config = VellumConfig::default();

        assert_eq!(config.access.override_roles, vec!["super_admin".to_string()]);
        assert_eq!(config.access.fetch_timeout_ms, 5000);
        assert!(config.access.audit_decisions);

        assert_eq!(config.source.kind, SourceKind::Static);
        assert!(config.source.url.is_none());
        assert_eq!(config.source.permissions_table, "element_permissions");

        assert_eq!(config.routes.login_path, "/login");
        assert_eq!(config.routes.unauthorized_path, "/unauthorized");
        assert_eq!(config.routes.deny_behavior, DenyBehavior::Render);

        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_config_serializes_to_yaml() {
        let yaml = serde_yaml::to_string(&VellumConfig::default()).unwrap();

        assert!(yaml.contains("access:"));
        assert!(yaml.contains("source:"));
        assert!(yaml.contains("routes:"));
        assert!(yaml.contains("kind: static"));
        assert!(yaml.contains("deny_behavior: render"));
    }

    #[test]
    fn test_partial_configs_merge_with_defaults() {
        let partial_yaml = r#"
access:
  fetch_timeout_ms: 250
"#;

        let config: VellumConfig = serde_yaml::from_str(partial_yaml).unwrap();

        assert_eq!(config.access.fetch_timeout_ms, 250);
        assert_eq!(config.access.fetch_timeout().as_millis(), 250);
        assert_eq!(config.access.override_roles, vec!["super_admin".to_string()]);
        assert_eq!(config.routes.login_path, "/login");
    }
}

//! Configuration file loading and parsing.

use crate::env::Environment;
use crate::types::{SourceKind, VellumConfig};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

/// Config file location relative to the project directory.
pub const CONFIG_FILE: &str = ".vellum/config.yaml";

/// Config loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read config: {source}")]
    ReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("invalid YAML at line {}: {message}", line.map(|l| l.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    ParseError { line: Option<usize>, message: String },

    #[error("validation error: {message}")]
    ValidationError { message: String },

    #[error("environment variable not found: {var}")]
    EnvVarNotFound { var: String },
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").expect("env var pattern compiles")
    })
}

/// Configuration loader.
pub struct ConfigLoader {
    config_path: PathBuf,
    required: bool,
}

impl ConfigLoader {
    /// Create a loader for `.vellum/config.yaml` under the given project directory.
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            config_path: project_dir.as_ref().join(CONFIG_FILE),
            required: false,
        }
    }

    /// Create a loader for an explicit file. The file must exist.
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
            required: true,
        }
    }

    /// Path this loader reads from.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration, falling back to defaults when an optional file is absent.
    pub fn load(&self) -> Result<VellumConfig, ConfigError> {
        if !self.config_path.exists() {
            if self.required {
                return Err(ConfigError::NotFound {
                    path: self.config_path.clone(),
                });
            }
            return Ok(VellumConfig::default());
        }

        let contents = std::fs::read_to_string(&self.config_path)?;
        let config = self.parse(&contents)?;
        validate(&config)?;
        Ok(config)
    }

    fn parse(&self, contents: &str) -> Result<VellumConfig, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
            line: e.location().map(|l| l.line()),
            message: e.to_string(),
        })
    }
}

/// Expand environment variables in the form `${VAR}` or `${VAR:-default}`.
pub fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
    let mut result = content.to_string();

    for cap in env_var_pattern().captures_iter(content) {
        let full_match = &cap[0];
        let var_name = &cap[1];
        let default = cap.get(2).map(|m| m.as_str());

        let value = match Environment::get(var_name) {
            Some(v) => v,
            None => match default {
                Some(d) => d.to_string(),
                None => {
                    return Err(ConfigError::EnvVarNotFound {
                        var: var_name.to_string(),
                    })
                }
            },
        };

        result = result.replace(full_match, &value);
    }

    Ok(result)
}

/// Validate configuration values.
pub fn validate(config: &VellumConfig) -> Result<(), ConfigError> {
    if config.access.fetch_timeout_ms == 0 {
        return Err(ConfigError::ValidationError {
            message: "access.fetch_timeout_ms must be greater than 0".to_string(),
        });
    }

    if config.source.kind == SourceKind::Rest {
        let has_url = config
            .source
            .url
            .as_deref()
            .map(|u| !u.trim().is_empty())
            .unwrap_or(false);
        if !has_url {
            return Err(ConfigError::ValidationError {
                message: "source.url is required when source.kind is rest".to_string(),
            });
        }
        if config.source.check_function.is_empty() || config.source.permissions_table.is_empty() {
            return Err(ConfigError::ValidationError {
                message: "source.check_function and source.permissions_table must be set".to_string(),
            });
        }
    }

    for (name, path) in [
        ("routes.login_path", &config.routes.login_path),
        ("routes.unauthorized_path", &config.routes.unauthorized_path),
    ] {
        if !path.starts_with('/') {
            return Err(ConfigError::ValidationError {
                message: format!("{name} must start with '/'"),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DenyBehavior;
    use std::fs;
    use tempfile::tempdir;

    fn write_config(dir: &Path, contents: &str) {
        let vellum_dir = dir.join(".vellum");
        fs::create_dir_all(&vellum_dir).unwrap();
        fs::write(vellum_dir.join("config.yaml"), contents).unwrap();
    }

    #[test]
    fn test_load_defaults_when_no_file() {
        let dir = tempdir().unwrap();
        let config = ConfigLoader::new(dir.path()).load().unwrap();
        assert_eq!(config.access.override_roles, vec!["super_admin"]);
        assert_eq!(config.source.kind, SourceKind::Static);
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = tempdir().unwrap();
        let loader = ConfigLoader::from_file(dir.path().join("missing.yaml"));
        match loader.load().unwrap_err() {
            ConfigError::NotFound { path } => assert!(path.ends_with("missing.yaml")),
            other => panic!("Expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_load_config_from_yaml_file() {
        let dir = tempdir().unwrap();
        write_config(
            dir.path(),
            r#"
access:
  override_roles: [super_admin, owner]
  fetch_timeout_ms: 1500
source:
  kind: rest
  url: https://crm.supabase.co
routes:
  deny_behavior: redirect
"#,
        );

        let config = ConfigLoader::new(dir.path()).load().unwrap();

        assert_eq!(config.access.override_roles, vec!["super_admin", "owner"]);
        assert_eq!(config.access.fetch_timeout_ms, 1500);
        assert_eq!(config.source.kind, SourceKind::Rest);
        assert_eq!(config.source.url.as_deref(), Some("https://crm.supabase.co"));
        assert_eq!(config.routes.deny_behavior, DenyBehavior::Redirect);

        // Unspecified values use defaults
        assert!(config.access.audit_decisions);
        assert_eq!(config.source.check_function, "check_element_permission");
        assert_eq!(config.routes.login_path, "/login");
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("VELLUM_TEST_URL", "https://tenant.example");
        let result = expand_env_vars("url: ${VELLUM_TEST_URL}").unwrap();
        assert_eq!(result, "url: https://tenant.example");
        std::env::remove_var("VELLUM_TEST_URL");
    }

    #[test]
    fn test_env_var_default() {
        let result = expand_env_vars("key: ${VELLUM_NONEXISTENT:-anon}").unwrap();
        assert_eq!(result, "key: anon");

        let empty = expand_env_vars("key: '${VELLUM_NONEXISTENT_EMPTY:-}'").unwrap();
        assert_eq!(empty, "key: ''");
    }

    #[test]
    fn test_env_var_missing_error() {
        match expand_env_vars("key: ${VELLUM_MISSING_VAR}").unwrap_err() {
            ConfigError::EnvVarNotFound { var } => assert_eq!(var, "VELLUM_MISSING_VAR"),
            other => panic!("Expected EnvVarNotFound error, got {other:?}"),
        }
    }

    #[test]
    fn test_validation_errors() {
        let mut config = VellumConfig::default();
        config.access.fetch_timeout_ms = 0;
        match validate(&config).unwrap_err() {
            ConfigError::ValidationError { message } => assert!(message.contains("fetch_timeout_ms")),
            other => panic!("Expected ValidationError, got {other:?}"),
        }

        let mut config = VellumConfig::default();
        config.source.kind = SourceKind::Rest;
        match validate(&config).unwrap_err() {
            ConfigError::ValidationError { message } => assert!(message.contains("source.url")),
            other => panic!("Expected ValidationError, got {other:?}"),
        }

        let mut config = VellumConfig::default();
        config.routes.login_path = "login".to_string();
        match validate(&config).unwrap_err() {
            ConfigError::ValidationError { message } => assert!(message.contains("routes.login_path")),
            other => panic!("Expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_with_line_number() {
        let dir = tempdir().unwrap();
        write_config(
            dir.path(),
            r#"
access:
  override_roles: [unclosed
"#,
        );

        match ConfigLoader::new(dir.path()).load().unwrap_err() {
            ConfigError::ParseError { line, .. } => assert!(line.is_some()),
            other => panic!("Expected ParseError with line number, got {other:?}"),
        }
    }
}

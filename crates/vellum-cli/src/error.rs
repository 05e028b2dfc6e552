//! CLI error handling.

use std::io;
use std::process::ExitCode;

use thiserror::Error;
use vellum_access::{AccessError, SourceError};
use vellum_common_config::ConfigError;

/// CLI error type with context for the operator
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        hint: Option<String>,
    },

    #[error("{message}")]
    Io {
        message: String,
        #[source]
        source: io::Error,
    },

    #[error("{message}")]
    Validation {
        message: String,
        hint: Option<String>,
    },

    #[error("{message}")]
    Source {
        message: String,
        #[source]
        source: Option<SourceError>,
    },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Get the error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "E001",
            Self::Io { .. } => "E002",
            Self::Validation { .. } => "E004",
            Self::Source { .. } => "E008",
            Self::Other(_) => "E999",
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        let code = match self {
            Self::Config { .. } => 2,
            Self::Io { .. } => 3,
            Self::Validation { .. } => 5,
            Self::Source { .. } => 9,
            Self::Other(_) => 1,
        };
        ExitCode::from(code)
    }

    /// Get hint for this error if available
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Config { hint, .. } | Self::Validation { hint, .. } => hint.as_deref(),
            _ => None,
        }
    }

    /// Create a config error with hint
    pub fn config_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
            hint: Some(hint.into()),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            hint: None,
        }
    }
}

impl From<io::Error> for CliError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(anyhow::anyhow!("JSON serialization failed: {err}"))
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        let hint = match &err {
            ConfigError::NotFound { .. } => {
                "Pass --config or set VELLUM_CONFIG_PATH to an existing file"
            }
            ConfigError::EnvVarNotFound { .. } => {
                "Export the variable or give it a default with ${VAR:-default}"
            }
            _ => "Check your .vellum/config.yaml",
        };
        Self::Config {
            message: format!("Configuration error: {err}"),
            source: Some(Box::new(err)),
            hint: Some(hint.to_string()),
        }
    }
}

impl From<SourceError> for CliError {
    fn from(err: SourceError) -> Self {
        Self::Source {
            message: format!("Permission source error: {err}"),
            source: Some(err),
        }
    }
}

impl From<AccessError> for CliError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::MalformedElementPath { path, reason } => Self::Validation {
                message: format!("malformed element path '{path}': {reason}"),
                hint: Some("Element paths look like 'deal:field.amount' or 'crm:*'".to_string()),
            },
            AccessError::MalformedAction { reason } => Self::Validation {
                message: format!("malformed action: {reason}"),
                hint: Some("Actions are names like 'visible', 'editable' or 'delete'".to_string()),
            },
            AccessError::FetchFailure(source) => source.into(),
            other => Self::Other(other.into()),
        }
    }
}

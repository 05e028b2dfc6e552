//! Environment variable handling.

use std::env;
use thiserror::Error;

/// Environment variable errors.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("failed to load .env file: {0}")]
    DotenvError(#[from] dotenvy::Error),
}

/// Environment variable names.
pub mod vars {
    pub const VELLUM_LOG_LEVEL: &str = "VELLUM_LOG_LEVEL";
    pub const VELLUM_ENV: &str = "VELLUM_ENV";
}

/// Environment configuration.
pub struct Environment {
    _guard: (),
}

impl Environment {
    /// Initialize environment from .env files.
    pub fn init() -> Result<Self, EnvError> {
        // Variables already set are never overridden
        let _ = dotenvy::from_filename(".env");
        let _ = dotenvy::from_filename(".env.local");

        if let Ok(env) = env::var(vars::VELLUM_ENV) {
            let _ = dotenvy::from_filename(format!(".env.{}", env));
        }

        Ok(Self { _guard: () })
    }

    /// Get an optional string variable.
    pub fn get(var: &str) -> Option<String> {
        env::var(var).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing_var() {
        assert_eq!(Environment::get("VELLUM_NONEXISTENT_VAR_12345"), None);
    }

    #[test]
    fn test_environment_init() {
        assert!(Environment::init().is_ok());
    }
}

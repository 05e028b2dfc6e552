//! Common test utilities for CLI testing.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Output;

use assert_cmd::Command;
use tempfile::{tempdir, TempDir};

/// Test context with temporary directory
pub struct TestContext {
    pub temp_dir: TempDir,
    pub config_path: Option<PathBuf>,
}

impl TestContext {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("Failed to create temp dir"),
            config_path: None,
        }
    }

    /// Write `.vellum/config.yaml` and point the CLI at it
    pub fn with_config(mut self, config: &str) -> Self {
        let path = self.path().join(".vellum").join("config.yaml");
        std::fs::create_dir_all(path.parent().unwrap()).expect("Failed to create config dir");
        std::fs::write(&path, config).expect("Failed to write config");
        self.config_path = Some(path);
        self
    }

    /// Write a file relative to the temp directory
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path().join(name);
        std::fs::write(&path, contents).expect("Failed to write file");
        path
    }

    /// Get path to temp directory
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a command configured for this context
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("vellum").expect("Binary not found");
        cmd.current_dir(self.path())
            .env_remove("VELLUM_CONFIG_PATH")
            .env_remove("VELLUM_LOG_LEVEL")
            .env_remove("RUST_LOG")
            .env("NO_COLOR", "1");
        if let Some(path) = &self.config_path {
            cmd.env("VELLUM_CONFIG_PATH", path);
        }
        cmd
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Assert helpers for CLI output
pub trait OutputAssertions {
    fn assert_success(&self);
    fn assert_stdout_contains(&self, text: &str);
    fn assert_stderr_contains(&self, text: &str);
    fn assert_exit_code(&self, code: i32);
}

impl OutputAssertions for Output {
    fn assert_success(&self) {
        assert!(
            self.status.success(),
            "Command failed with status: {}\nstderr: {}",
            self.status,
            String::from_utf8_lossy(&self.stderr)
        );
    }

    fn assert_stdout_contains(&self, text: &str) {
        let stdout = String::from_utf8_lossy(&self.stdout);
        assert!(
            stdout.contains(text),
            "stdout did not contain '{}'\nstdout: {}",
            text,
            stdout
        );
    }

    fn assert_stderr_contains(&self, text: &str) {
        let stderr = String::from_utf8_lossy(&self.stderr);
        assert!(
            stderr.contains(text),
            "stderr did not contain '{}'\nstderr: {}",
            text,
            stderr
        );
    }

    fn assert_exit_code(&self, code: i32) {
        assert_eq!(
            self.status.code(),
            Some(code),
            "Expected exit code {}, got {:?}",
            code,
            self.status.code()
        );
    }
}

/// Parse JSON from stdout
pub fn parse_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("Failed to parse JSON output")
}

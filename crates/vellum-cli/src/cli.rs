//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};
use vellum_common_config::{ConfigLoader, VellumConfig};

use crate::commands::{CheckCommand, ConfigCommand, PrefetchCommand};
use crate::error::CliError;

/// Vellum - element-level permissions for the CRM
///
/// Inspect how the configured permission source answers for a role.
#[derive(Debug, Parser)]
#[command(
    name = "vellum",
    author,
    version,
    about,
    long_about = None,
    propagate_version = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Increase verbosity level (-v, -vv, -vvv)
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true,
        help = "Increase verbosity level"
    )]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(
        short,
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Suppress non-error log output"
    )]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "VELLUM_CONFIG_PATH",
        value_hint = ValueHint::FilePath,
        help = "Path to configuration file"
    )]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        value_enum,
        help = "Output format (text, json)"
    )]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve one permission for a role
    Check(CheckCommand),

    /// Resolve a page of elements in one round trip
    Prefetch(PrefetchCommand),

    /// Inspect configuration
    Config(ConfigCommand),
}

impl Cli {
    /// Load configuration from `--config`, or `.vellum/config.yaml` under
    /// the working directory.
    pub fn load_config(&self) -> Result<VellumConfig, CliError> {
        let loader = match &self.config {
            Some(path) => ConfigLoader::from_file(path),
            None => ConfigLoader::new(std::env::current_dir()?),
        };
        Ok(loader.load()?)
    }

    /// Execute the selected command
    pub async fn execute(self, config: VellumConfig) -> Result<(), CliError> {
        let ctx = CommandContext {
            config,
            format: self.format,
            verbose: self.verbose,
        };

        match self.command {
            Command::Check(cmd) => cmd.execute(&ctx).await,
            Command::Prefetch(cmd) => cmd.execute(&ctx).await,
            Command::Config(cmd) => cmd.execute(&ctx),
        }
    }
}

/// Context passed to all commands
#[derive(Debug)]
pub struct CommandContext {
    pub config: VellumConfig,
    pub format: OutputFormat,
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_check_parses_identity_flags() {
        let cli = Cli::try_parse_from([
            "vellum",
            "--format",
            "json",
            "check",
            "--role",
            "sales",
            "--tenant",
            "acme",
            "deal:field.amount",
            "editable",
        ])
        .unwrap();

        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Command::Check(cmd) => {
                assert_eq!(cmd.identity.role, "sales");
                assert_eq!(cmd.identity.tenant.as_deref(), Some("acme"));
                assert_eq!(cmd.element, "deal:field.amount");
                assert_eq!(cmd.action, "editable");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["vellum", "-q", "-v", "config", "show"]);
        assert!(result.is_err());
    }
}

//! Config command implementation.

use clap::{Parser, Subcommand};
use vellum_common_config::VellumConfig;

use super::source::build_evaluator;
use crate::cli::{CommandContext, OutputFormat};
use crate::error::CliError;
use crate::output::{print_output, StatusOutput};

/// Inspect configuration
#[derive(Debug, Parser)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration, defaults and env expansion applied
    Show,

    /// Validate the configuration and the permission source it names
    Validate,
}

impl ConfigCommand {
    pub fn execute(&self, ctx: &CommandContext) -> Result<(), CliError> {
        match self.action {
            ConfigAction::Show => {
                println!("{}", render(&ctx.config, ctx.format)?);
                Ok(())
            }
            ConfigAction::Validate => {
                // Loading already validated the values; building the
                // evaluator also parses the policy file or the backend URL.
                build_evaluator(&ctx.config)?;
                let kind = serde_json::to_value(ctx.config.source.kind)?;
                let message = format!(
                    "configuration is valid ({} source)",
                    kind.as_str().unwrap_or("unknown")
                );
                print_output(ctx, &StatusOutput::success(message))
            }
        }
    }
}

fn render(config: &VellumConfig, format: OutputFormat) -> Result<String, CliError> {
    let mut config = config.clone();
    if config.source.api_key.as_deref().is_some_and(|k| !k.is_empty()) {
        config.source.api_key = Some("********".to_string());
    }
    let config = &config;

    match format {
        OutputFormat::Text => serde_yaml::to_string(config)
            .map(|yaml| yaml.trim_end().to_string())
            .map_err(|e| CliError::Other(anyhow::anyhow!("YAML serialization failed: {e}"))),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(config)?),
    }
}

//! Check command implementation.

use clap::Parser;
use serde::Serialize;
use tracing::info;
use vellum_access::Resolution;

use super::source::{build_evaluator, IdentityArgs};
use crate::cli::CommandContext;
use crate::error::CliError;
use crate::output::{print_output, FormattedOutput};

/// Resolve one permission for a role
#[derive(Debug, Parser)]
pub struct CheckCommand {
    #[command(flatten)]
    pub identity: IdentityArgs,

    /// Element path, e.g. `deal:field.amount`
    pub element: String,

    /// Action: visible, editable, create, read, update, delete
    #[arg(default_value = "visible")]
    pub action: String,

    /// Exit with status 1 when the permission is denied
    #[arg(long)]
    pub fail_on_deny: bool,
}

impl CheckCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<(), CliError> {
        let evaluator = build_evaluator(&ctx.config)?;
        let identity = self.identity.identity();

        let resolution = evaluator
            .resolve_permission(&identity, &self.element, self.action.as_str())
            .await?;
        info!(basis = resolution.basis(), "permission resolved");

        let output = CheckOutput::new(self, resolution);
        print_output(ctx, &output)?;

        if self.fail_on_deny && !output.granted {
            return Err(CliError::Other(anyhow::anyhow!(
                "{} {} denied for role {}",
                self.element,
                self.action,
                self.identity.role
            )));
        }
        Ok(())
    }
}

/// One resolved permission
#[derive(Debug, Serialize)]
pub struct CheckOutput {
    pub element: String,
    pub action: String,
    pub role: String,
    pub tenant: Option<String>,
    pub granted: bool,
    pub basis: &'static str,
}

impl CheckOutput {
    fn new(cmd: &CheckCommand, resolution: Resolution) -> Self {
        Self {
            element: cmd.element.clone(),
            action: cmd.action.clone(),
            role: cmd.identity.role.clone(),
            tenant: cmd.identity.tenant.clone(),
            granted: resolution.granted(),
            basis: resolution.basis(),
        }
    }
}

impl FormattedOutput for CheckOutput {
    fn format_text(&self) -> String {
        let mark = if self.granted { "✓ granted" } else { "✗ denied" };
        let who = match &self.tenant {
            Some(tenant) => format!("{}@{}", self.role, tenant),
            None => self.role.clone(),
        };
        format!(
            "{mark}  {} {} for {who} ({})",
            self.element, self.action, self.basis
        )
    }
}

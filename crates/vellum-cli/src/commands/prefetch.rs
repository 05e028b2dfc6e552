//! Prefetch command implementation.

use clap::Parser;
use serde::Serialize;
use vellum_access::{CacheStats, PermissionKey};

use super::source::{build_evaluator, IdentityArgs};
use crate::cli::CommandContext;
use crate::error::CliError;
use crate::output::{print_output, FormattedOutput};

/// Resolve a page of elements in one round trip
#[derive(Debug, Parser)]
pub struct PrefetchCommand {
    #[command(flatten)]
    pub identity: IdentityArgs,

    /// Element paths on the page
    #[arg(required = true)]
    pub elements: Vec<String>,

    /// Actions to resolve for every element
    #[arg(
        short,
        long = "action",
        value_delimiter = ',',
        default_values = ["visible", "editable"]
    )]
    pub actions: Vec<String>,
}

impl PrefetchCommand {
    fn keys(&self) -> Result<Vec<PermissionKey>, CliError> {
        let mut keys = Vec::with_capacity(self.elements.len() * self.actions.len());
        for element in &self.elements {
            for action in &self.actions {
                let key = PermissionKey::parse(element, action.as_str())?;
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        Ok(keys)
    }

    pub async fn execute(&self, ctx: &CommandContext) -> Result<(), CliError> {
        if self.actions.is_empty() {
            return Err(CliError::validation("at least one action is required"));
        }
        let keys = self.keys()?;
        let evaluator = build_evaluator(&ctx.config)?;
        let identity = self.identity.identity();

        let entries = evaluator
            .prefetch(&identity, &keys)
            .await
            .into_iter()
            .map(|(key, resolution)| PrefetchEntry {
                element: key.element.to_string(),
                action: key.action.to_string(),
                granted: resolution.granted(),
                basis: resolution.basis(),
            })
            .collect();

        let output = PrefetchOutput {
            role: self.identity.role.clone(),
            tenant: self.identity.tenant.clone(),
            entries,
            stats: evaluator.stats(),
        };
        print_output(ctx, &output)
    }
}

#[derive(Debug, Serialize)]
pub struct PrefetchEntry {
    pub element: String,
    pub action: String,
    pub granted: bool,
    pub basis: &'static str,
}

/// A pre-warmed page
#[derive(Debug, Serialize)]
pub struct PrefetchOutput {
    pub role: String,
    pub tenant: Option<String>,
    pub entries: Vec<PrefetchEntry>,
    pub stats: CacheStats,
}

impl FormattedOutput for PrefetchOutput {
    fn format_text(&self) -> String {
        let width = self
            .entries
            .iter()
            .map(|e| e.element.len())
            .max()
            .unwrap_or(0);

        let mut lines: Vec<String> = self
            .entries
            .iter()
            .map(|e| {
                let mark = if e.granted { "✓" } else { "✗" };
                format!(
                    "{mark} {:<width$}  {:<8}  {}",
                    e.element,
                    e.action,
                    e.basis,
                    width = width
                )
            })
            .collect();
        lines.push(format!(
            "{} permissions, {} source round trip(s)",
            self.entries.len(),
            self.stats.fetches
        ));
        lines.join("\n")
    }
}

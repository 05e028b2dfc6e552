//! Vellum CLI
//!
//! Main entry point for the `vellum` binary.

use std::process::ExitCode;

use clap::Parser;
use tracing::debug;
use vellum_common_config::{vars, Environment};
use vellum_common_log::{LogConfig, LogLevel};

use vellum_cli::cli::Cli;
use vellum_cli::error::CliError;

/// Application exit codes
#[repr(u8)]
pub enum Exit {
    Success = 0,
    GeneralError = 1,
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit as u8)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = Environment::init() {
        eprintln!("warning: {e}");
    }
    init_tracing(&cli);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("error: failed to create async runtime: {e}");
            return Exit::GeneralError.into();
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => Exit::Success.into(),
        Err(e) => {
            debug!(code = e.code(), error = ?e, "command failed");
            eprintln!("error[{}]: {e}", e.code());
            if let Some(hint) = e.hint() {
                eprintln!("  hint: {hint}");
            }
            e.exit_code()
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = cli.load_config()?;
    cli.execute(config).await
}

fn init_tracing(cli: &Cli) {
    let mut config = LogConfig::from_env();

    // Explicit flags beat the environment; otherwise stay quiet unless asked.
    config.level = match cli.verbose {
        0 if cli.quiet => LogLevel::Error,
        0 if Environment::get(vars::VELLUM_LOG_LEVEL).is_some() => config.level,
        0 => LogLevel::Warn,
        1 => LogLevel::Info,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    if let Err(e) = vellum_common_log::init(config) {
        eprintln!("warning: {e}");
    }
}

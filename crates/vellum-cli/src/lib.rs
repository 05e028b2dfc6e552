//! Vellum CLI library
//!
//! Argument parsing, command implementations and output formatting for
//! the `vellum` binary.

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use error::CliError;

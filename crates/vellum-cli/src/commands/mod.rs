//! Command implementations.

mod check;
mod config;
mod prefetch;
mod source;

pub use check::CheckCommand;
pub use config::{ConfigAction, ConfigCommand};
pub use prefetch::PrefetchCommand;
pub use source::{build_evaluator, build_source, IdentityArgs};

//! Command line interface for release_deploy.
//!
//! Parses the arguments, runs the release and maps its result to an exit
//! status. Operator-facing output goes through [`RuntimeConfig`].

mod args;
pub mod commands;
mod output;

pub use args::{Args, RuntimeConfig};
pub use commands::execute_command;
pub use output::OutputManager;

use crate::error::Result;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    execute_command(args).await
}


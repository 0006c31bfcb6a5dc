//! Command execution.
//!
//! Every fatal error ends up here, is printed with its recovery suggestions
//! and turned into exit status 1.

mod helpers;
mod release;

use crate::cli::{Args, RuntimeConfig};
use crate::error::Result;

use release::execute_release;

/// Execute the release described by the parsed arguments
pub async fn execute_command(args: Args) -> Result<i32> {
    if let Err(validation_error) = args.validate() {
        let output = super::OutputManager::new(false, false);
        output.error(&format!("Invalid arguments: {}", validation_error));
        return Ok(1);
    }

    let config = RuntimeConfig::from(&args);

    match execute_release(&args, &config).await {
        Ok(exit_code) => Ok(exit_code),
        Err(e) => {
            config.error_println(&format!("Aborting deployment: {}", e));

            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() {
                config.error_println("Recovery suggestions:");
                for suggestion in suggestions {
                    config.error_println(&format!("  • {}", suggestion));
                }
            }

            Ok(1)
        }
    }
}

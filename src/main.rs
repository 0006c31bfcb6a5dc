//! release_deploy - tag, publish and build a release across the platform matrix.

use release_deploy::cli;
use release_deploy::cli::OutputManager;
use std::process;

#[tokio::main]
async fn main() {
    env_logger::init();

    match cli::run().await {
        Ok(exit_code) => {
            process::exit(exit_code);
        }
        Err(e) => {
            // Create output manager for error display (never quiet for fatal errors)
            let output = OutputManager::new(false, false);
            output.error(&format!("Fatal error: {e}"));

            for suggestion in e.recovery_suggestions() {
                output.error(&format!("  • {}", suggestion));
            }

            process::exit(1);
        }
    }
}

//! Command line argument parsing and validation.
//!
//! The tool takes no positional arguments: the repository, credentials and
//! tuning all come from the environment. The only flag selects where a
//! previously interrupted release picks up.

use clap::Parser;

/// Publish a signed, tagged release and its platform builds
#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "release_deploy",
    version,
    about = "Tag, publish and build a release across the platform matrix",
    long_about = "Tag, publish and build a release across the platform matrix.

Usage:
  release_deploy                   start a new release
  release_deploy --resume publish  continue after the tag was pushed

Configuration is read from the environment:
  GITHUB_TOKEN, DEVPORTAL_ID, DEVPORTAL_KEY, RELEASE_REPO_PATH (required)"
)]
pub struct Args {
    /// Stage to resume at; empty starts a new release
    #[arg(long, value_name = "TOKEN", default_value = "")]
    pub resume: String,

    /// Show detailed progress
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only show warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.resume.chars().any(char::is_whitespace) {
            return Err(format!("resume token '{}' contains whitespace", self.resume));
        }
        Ok(())
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Output manager for colored terminal output
    output: super::OutputManager,
}

impl RuntimeConfig {
    /// Create runtime configuration with normal output
    pub fn new() -> Self {
        Self {
            output: super::OutputManager::new(false, false),
        }
    }

    /// Runtime configuration that only prints errors
    pub fn quiet() -> Self {
        Self {
            output: super::OutputManager::new(false, true),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self {
            output: super::OutputManager::new(args.verbose, args.quiet),
        }
    }
}

impl RuntimeConfig {
    /// Print message
    pub fn println(&self, message: &str) {
        let _ = self.output.println(message);
    }

    /// Print message only in verbose mode
    pub fn verbose_println(&self, message: &str) {
        let _ = self.output.verbose(message);
    }

    /// Print a step that is starting
    pub fn progress_println(&self, message: &str) {
        let _ = self.output.progress(message);
    }

    /// Print a section header
    pub fn section(&self, title: &str) {
        let _ = self.output.section(title);
    }

    /// Print error message (always shown)
    pub fn error_println(&self, message: &str) {
        self.output.error(message);
    }

    /// Print warning message
    pub fn warning_println(&self, message: &str) {
        let _ = self.output.warn(message);
    }

    /// Print success message
    pub fn success_println(&self, message: &str) {
        let _ = self.output.success(message);
    }

    /// Print indented text
    pub fn indent(&self, message: &str) {
        let _ = self.output.indent(message);
    }

    /// Ring the terminal bell
    pub fn bell(&self) {
        self.output.bell();
    }
}

//! Checks and confirmations that run before anything is published.
//!
//! Nothing here mutates the repository or any remote service. A failure
//! leaves the world exactly as it was.

use crate::cli::RuntimeConfig;
use crate::config::EnvConfig;
use crate::error::{ConfigError, PreconditionError, Result};
use crate::git::GitOperations;
use crate::prompt::Prompter;

/// Executables that must be on `PATH` besides the builder
const REQUIRED_TOOLS: &[&str] = &["git"];

/// Confirmation shown after the commit summary
pub const CONFIRM_COMMIT: &str = "Is this the right commit to release?";

/// Confirmation that release notes were updated
pub const CONFIRM_CHANGELOG: &str =
    "Have README.txt and CHANGES.txt been updated for the new version?";

/// Last gate before tagging
pub const CONFIRM_READY: &str = "I'm ready. Are you ready? There's no going back:";

/// Every required configuration value is present and the repository exists
pub fn check_environment(config: &EnvConfig) -> Result<()> {
    if let Some(&name) = config.missing_required().first() {
        return Err(ConfigError::MissingVariable { name }.into());
    }
    if !config.repo_path.is_dir() {
        return Err(ConfigError::RepositoryNotFound {
            path: config.repo_path.clone(),
        }
        .into());
    }
    Ok(())
}

/// `git` and the builder executable are installed
pub fn check_tools(config: &EnvConfig) -> Result<()> {
    for tool in REQUIRED_TOOLS
        .iter()
        .copied()
        .chain(std::iter::once(config.builder.as_str()))
    {
        if which::which(tool).is_err() {
            return Err(ConfigError::ToolNotFound {
                tool: tool.to_string(),
            }
            .into());
        }
        log::debug!("found {} on PATH", tool);
    }
    Ok(())
}

/// Runs the pre-release checks against a repository
pub struct PreflightChecker<'a, G, P> {
    git: &'a G,
    prompter: &'a P,
    runtime: &'a RuntimeConfig,
}

impl<'a, G: GitOperations, P: Prompter> PreflightChecker<'a, G, P> {
    /// Create a checker
    pub fn new(git: &'a G, prompter: &'a P, runtime: &'a RuntimeConfig) -> Self {
        Self {
            git,
            prompter,
            runtime,
        }
    }

    /// See [`check_environment`]
    pub fn check_environment(&self, config: &EnvConfig) -> Result<()> {
        check_environment(config)
    }

    /// See [`check_tools`]
    pub fn check_tools(&self, config: &EnvConfig) -> Result<()> {
        check_tools(config)
    }

    /// No tracked file differs from HEAD
    pub async fn check_clean_tree(&self) -> Result<()> {
        let status = self.git.tracked_changes().await?;
        if !status.is_empty() {
            return Err(PreconditionError::DirtyWorkingTree {
                changes: status.len(),
                status,
            }
            .into());
        }
        Ok(())
    }

    /// Show the HEAD commit and ask whether it is the one to release
    pub async fn confirm_commit(&self) -> Result<()> {
        let summary = self.git.commit_summary().await?;
        self.runtime.println(summary.trim_end());
        self.ask(CONFIRM_COMMIT).await
    }

    /// Ask whether the release notes are up to date
    pub async fn confirm_changelog(&self) -> Result<()> {
        self.ask(CONFIRM_CHANGELOG).await
    }

    /// Final confirmation before tagging
    pub async fn confirm_ready(&self) -> Result<()> {
        self.ask(CONFIRM_READY).await
    }

    async fn ask(&self, question: &str) -> Result<()> {
        if self.prompter.confirm(question).await? {
            Ok(())
        } else {
            Err(PreconditionError::UserAborted {
                reason: question.to_string(),
            }
            .into())
        }
    }
}

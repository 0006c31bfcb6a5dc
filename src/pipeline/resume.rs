//! Re-entering a release after the tag was pushed.

use super::RunPlan;
use crate::cli::RuntimeConfig;
use crate::error::{CliError, ConfigError, PreconditionError, Result};
use crate::git::GitOperations;
use crate::prompt::Prompter;
use crate::state::PipelineState;
use crate::version::{ReleaseTag, TagPlanner};

/// Question asked before a resumed run continues
pub const CONFIRM_RESUME: &str = "Continue?";

/// Where a resumed run picks up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeToken {
    /// Create (or reuse) the hosted release, then build, upload and notify
    Publish,
}

impl ResumeToken {
    /// Tokens accepted on the command line
    pub const ACCEPTED: &'static [&'static str] = &["publish"];

    /// Parse the `--resume` value; empty means a new release
    pub fn parse(raw: &str) -> Result<Option<Self>> {
        match raw.trim() {
            "" => Ok(None),
            "publish" => Ok(Some(ResumeToken::Publish)),
            other => Err(ConfigError::UnknownResumeToken {
                token: other.to_string(),
                expected: Self::ACCEPTED.join(", "),
            }
            .into()),
        }
    }

    /// Stage the pipeline enters at
    pub fn entry_state(self) -> PipelineState {
        match self {
            ResumeToken::Publish => PipelineState::Published,
        }
    }
}

/// Turns a resume token into a run plan for the most recent tag
pub struct ResumeController<'a, G, P> {
    git: &'a G,
    prompter: &'a P,
    runtime: &'a RuntimeConfig,
}

impl<'a, G: GitOperations, P: Prompter> ResumeController<'a, G, P> {
    /// Create a controller
    pub fn new(git: &'a G, prompter: &'a P, runtime: &'a RuntimeConfig) -> Self {
        Self {
            git,
            prompter,
            runtime,
        }
    }

    /// Read the tag from git and confirm with the operator
    pub async fn resolve(&self, token: ResumeToken) -> Result<RunPlan> {
        let tag = TagPlanner::new(self.git).current_tag().await?;
        if tag == ReleaseTag::initial() {
            return Err(CliError::InvalidArguments {
                reason: "the repository has no tags, there is no release to resume".to_string(),
            }
            .into());
        }

        self.runtime
            .warning_println(&format!("The deploy for {} is being resumed.", tag));
        match token {
            ResumeToken::Publish => self
                .runtime
                .indent("The process will pick up at publishing the hosted release."),
        }

        if !self.prompter.confirm(CONFIRM_RESUME).await? {
            return Err(PreconditionError::UserAborted {
                reason: "resumed deployment declined".to_string(),
            }
            .into());
        }

        Ok(RunPlan::resume(tag, token))
    }
}

//! `GitOperations` backed by the system `git` executable.
//!
//! Signed tags need the user's gpg/ssh signing setup and may prompt for a
//! passphrase, so mutating commands inherit the terminal instead of capturing
//! output.

use crate::error::{GitError, PublishError, Result};
use crate::git::GitOperations;
use crate::version::ReleaseTag;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;

/// Git operations run through `git -C <repo>`
#[derive(Debug, Clone)]
pub struct SystemGitOperations {
    repo_path: PathBuf,
}

impl SystemGitOperations {
    /// Operate on the repository at `repo_path`
    pub fn new<P: AsRef<Path>>(repo_path: P) -> Self {
        Self {
            repo_path: repo_path.as_ref().to_path_buf(),
        }
    }

    /// Repository root this instance operates on
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new("git");
        command.args(args).current_dir(&self.repo_path);
        command
    }

    /// Run a query and capture stdout
    async fn query(&self, args: &[&str]) -> Result<String> {
        let output: Output = self
            .command(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| GitError::CommandFailed {
                command: args.join(" "),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("not a git repository") {
                return Err(GitError::NotRepository {
                    path: self.repo_path.clone(),
                }
                .into());
            }
            return Err(GitError::CommandFailed {
                command: args.join(" "),
                reason: stderr.trim().to_string(),
            }
            .into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run a command attached to the terminal; returns a failure reason
    async fn run_attached(&self, args: &[&str]) -> std::result::Result<(), String> {
        log::debug!("git {}", args.join(" "));
        let status = self
            .command(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| e.to_string())?;

        if status.success() {
            Ok(())
        } else {
            Err(format!("exit status {}", status))
        }
    }
}

impl GitOperations for SystemGitOperations {
    async fn list_tags(&self) -> Result<Vec<String>> {
        let out = self.query(&["tag", "--list"]).await?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn tracked_changes(&self) -> Result<Vec<String>> {
        let out = self
            .query(&["status", "--porcelain", "--untracked-files=no"])
            .await?;
        Ok(out
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn head_commit(&self) -> Result<String> {
        let out = self.query(&["rev-parse", "HEAD"]).await?;
        Ok(out.trim().to_string())
    }

    async fn commit_summary(&self) -> Result<String> {
        self.query(&["show", "--summary", "--no-color"]).await
    }

    async fn create_signed_tag(&self, tag: &ReleaseTag, message: &str) -> Result<()> {
        self.run_attached(&["tag", "-s", tag.as_str(), "-m", message])
            .await
            .map_err(|reason| {
                PublishError::TagFailed {
                    tag: tag.to_string(),
                    reason,
                }
                .into()
            })
    }

    async fn push(&self) -> Result<()> {
        self.run_attached(&["push"]).await.map_err(|reason| {
            PublishError::PushFailed {
                operation: "git push".to_string(),
                reason,
            }
            .into()
        })
    }

    async fn push_tags(&self) -> Result<()> {
        self.run_attached(&["push", "--tags"])
            .await
            .map_err(|reason| {
                PublishError::PushFailed {
                    operation: "git push --tags".to_string(),
                    reason,
                }
                .into()
            })
    }

    async fn remote_url(&self, remote: &str) -> Result<Option<String>> {
        match self.query(&["remote", "get-url", remote]).await {
            Ok(url) => Ok(Some(url.trim().to_string())),
            Err(crate::ReleaseError::Git(GitError::CommandFailed { .. })) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

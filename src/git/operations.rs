//! Git operations the release workflow depends on.
//!
//! The orchestrator only talks to version control through this trait, so the
//! pipeline can be exercised against an in-memory fake in tests.

use crate::error::Result;
use crate::version::ReleaseTag;
use std::future::Future;

/// Trait defining the Git operations required for a release
pub trait GitOperations: Send + Sync {
    /// All tag names in the repository
    fn list_tags(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Porcelain status lines for tracked files that differ from HEAD.
    /// Untracked files are not reported.
    fn tracked_changes(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Full hash of the HEAD commit
    fn head_commit(&self) -> impl Future<Output = Result<String>> + Send;

    /// Human-readable summary of the HEAD commit (`git show --summary`)
    fn commit_summary(&self) -> impl Future<Output = Result<String>> + Send;

    /// Create a signed, annotated tag on HEAD
    fn create_signed_tag(
        &self,
        tag: &ReleaseTag,
        message: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Push the current branch to its upstream
    fn push(&self) -> impl Future<Output = Result<()>> + Send;

    /// Push all tags to the default remote
    fn push_tags(&self) -> impl Future<Output = Result<()>> + Send;

    /// Fetch URL of a remote, `None` when the remote does not exist
    fn remote_url(&self, remote: &str) -> impl Future<Output = Result<Option<String>>> + Send;
}

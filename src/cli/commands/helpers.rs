//! Shared helper functions for command execution.

use crate::config::GitHubRepo;
use crate::error::{CliError, ConfigError, ReleaseError, Result};

/// Remote the GitHub repository is inferred from
pub(super) const GITHUB_REMOTE: &str = "origin";

/// Repository to publish to: the configured one, else the one behind the
/// `origin` remote
pub(super) fn resolve_github_repo(
    configured: Option<&GitHubRepo>,
    remote_url: Option<&str>,
) -> Result<GitHubRepo> {
    if let Some(repo) = configured {
        return Ok(repo.clone());
    }
    match remote_url {
        Some(url) => parse_github_url(url),
        None => Err(ConfigError::MissingRemote {
            remote: GITHUB_REMOTE,
        }
        .into()),
    }
}

/// Parse GitHub owner/repo from git remote URL
///
/// Supports Git URL formats:
/// - SSH SCP-like: git@github.com:owner/repo.git
/// - HTTPS: https://github.com/owner/repo.git
/// - SSH protocol: ssh://git@github.com/owner/repo.git
pub(super) fn parse_github_url(url: &str) -> Result<GitHubRepo> {
    let url = url.trim();

    // SSH SCP-like format: git@github.com:owner/repo.git
    if url.contains('@')
        && !url.contains("://")
        && let Some((_, path)) = url.split_once(':')
        && let Some(repo) = GitHubRepo::parse(path)
    {
        return Ok(repo);
    }

    // HTTPS/SSH protocol URLs
    if let Some(path_start) = url.find("github.com/") {
        let path = url[path_start + "github.com/".len()..].trim_end_matches('/');
        let mut parts = path.split('/');
        if let (Some(owner), Some(name)) = (parts.next(), parts.next())
            && let Some(repo) = GitHubRepo::parse(&format!("{}/{}", owner, name))
        {
            return Ok(repo);
        }
    }

    Err(ReleaseError::Cli(CliError::InvalidArguments {
        reason: format!(
            "Could not parse GitHub owner/repo from URL: '{}'. Set RELEASE_GITHUB_REPO=owner/repo",
            url
        ),
    }))
}

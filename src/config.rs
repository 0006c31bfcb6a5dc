//! Environment configuration for a release run.
//!
//! Everything the run needs from the environment is read once into
//! [`EnvConfig`] and passed around by reference. Required values may be
//! missing at load time; `preflight::check_environment` reports them.
//! Malformed optional values are rejected while loading.

use crate::error::{ConfigError, Result};
use crate::platform::PlatformPattern;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default deployment service base URL
pub const DEFAULT_DEPLOY_URL: &str = "http://localhost:2015";

/// Default product name used in asset names and the deploy endpoint
pub const DEFAULT_PRODUCT: &str = "caddy";

/// Default builder executable
pub const DEFAULT_BUILDER: &str = "buildworker";

/// Default GitHub REST endpoint
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Default GitHub asset upload endpoint
pub const DEFAULT_GITHUB_UPLOADS_URL: &str = "https://uploads.github.com";

/// Concurrent builds when not configured
pub const DEFAULT_BUILD_CONCURRENCY: usize = 2;

/// Concurrent uploads when not configured
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 3;

/// Upper bound for either throttle
pub const MAX_CONCURRENCY: usize = 16;

/// Seconds between pushing the tag and creating the release
pub const DEFAULT_PUBLISH_DELAY_SECS: u64 = 5;

/// Longest accepted publish delay
pub const MAX_PUBLISH_DELAY_SECS: u64 = 300;

/// GitHub repository coordinates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubRepo {
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub name: String,
}

impl GitHubRepo {
    /// Parse `owner/repo`
    pub fn parse(raw: &str) -> Option<Self> {
        let (owner, name) = raw.trim().split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self {
            owner: owner.to_string(),
            name: name.trim_end_matches(".git").to_string(),
        })
    }
}

impl std::fmt::Display for GitHubRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Immutable configuration of one release run
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// GitHub API token (`GITHUB_TOKEN`, falling back to `GH_TOKEN`)
    pub github_token: String,
    /// Deployment service account id (`DEVPORTAL_ID`)
    pub devportal_id: String,
    /// Deployment service key (`DEVPORTAL_KEY`)
    pub devportal_key: String,
    /// Source repository being released (`RELEASE_REPO_PATH`)
    pub repo_path: PathBuf,
    /// Explicit `owner/repo`; parsed from `origin` when absent
    pub github_repo: Option<GitHubRepo>,
    /// Deployment service base URL
    pub deploy_url: Url,
    /// Product name
    pub product: String,
    /// Builder executable
    pub builder: String,
    /// Build throttle capacity
    pub build_concurrency: usize,
    /// Upload throttle capacity
    pub upload_concurrency: usize,
    /// Wait between push and release creation
    pub publish_delay: Duration,
    /// Extra exclusion patterns (`os/arch/arm`)
    pub skip_platforms: Vec<String>,
    /// Directory holding run state files
    pub state_dir: PathBuf,
    /// GitHub REST endpoint
    pub github_api_url: Url,
    /// GitHub upload endpoint
    pub github_uploads_url: Url,
}

impl EnvConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let github_token = get("GITHUB_TOKEN")
            .or_else(|| get("GH_TOKEN"))
            .unwrap_or_default();

        let github_repo = match get("RELEASE_GITHUB_REPO") {
            Some(raw) => Some(GitHubRepo::parse(&raw).ok_or(ConfigError::InvalidValue {
                name: "RELEASE_GITHUB_REPO",
                reason: format!("'{}' is not in owner/repo form", raw),
            })?),
            None => None,
        };

        let skip_platforms: Vec<String> = get("RELEASE_SKIP_PLATFORMS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        for pattern in &skip_platforms {
            PlatformPattern::parse(pattern)?;
        }

        let state_dir = get("RELEASE_STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_state_dir);

        Ok(Self {
            github_token,
            devportal_id: get("DEVPORTAL_ID").unwrap_or_default(),
            devportal_key: get("DEVPORTAL_KEY").unwrap_or_default(),
            repo_path: get("RELEASE_REPO_PATH").map(PathBuf::from).unwrap_or_default(),
            github_repo,
            deploy_url: parse_url("RELEASE_DEPLOY_URL", get("RELEASE_DEPLOY_URL"), DEFAULT_DEPLOY_URL)?,
            product: get("RELEASE_PRODUCT").unwrap_or_else(|| DEFAULT_PRODUCT.to_string()),
            builder: get("RELEASE_BUILDER").unwrap_or_else(|| DEFAULT_BUILDER.to_string()),
            build_concurrency: parse_bounded(
                "RELEASE_BUILD_CONCURRENCY",
                get("RELEASE_BUILD_CONCURRENCY"),
                DEFAULT_BUILD_CONCURRENCY as u64,
                1,
                MAX_CONCURRENCY as u64,
            )? as usize,
            upload_concurrency: parse_bounded(
                "RELEASE_UPLOAD_CONCURRENCY",
                get("RELEASE_UPLOAD_CONCURRENCY"),
                DEFAULT_UPLOAD_CONCURRENCY as u64,
                1,
                MAX_CONCURRENCY as u64,
            )? as usize,
            publish_delay: Duration::from_secs(parse_bounded(
                "RELEASE_PUBLISH_DELAY_SECS",
                get("RELEASE_PUBLISH_DELAY_SECS"),
                DEFAULT_PUBLISH_DELAY_SECS,
                0,
                MAX_PUBLISH_DELAY_SECS,
            )?),
            skip_platforms,
            state_dir,
            github_api_url: parse_url("GITHUB_API_URL", get("GITHUB_API_URL"), DEFAULT_GITHUB_API_URL)?,
            github_uploads_url: parse_url(
                "GITHUB_UPLOADS_URL",
                get("GITHUB_UPLOADS_URL"),
                DEFAULT_GITHUB_UPLOADS_URL,
            )?,
        })
    }

    /// Required values that are unset or empty, in the order they are reported
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.github_token.is_empty() {
            missing.push("GITHUB_TOKEN");
        }
        if self.devportal_id.is_empty() {
            missing.push("DEVPORTAL_ID");
        }
        if self.devportal_key.is_empty() {
            missing.push("DEVPORTAL_KEY");
        }
        if self.repo_path.as_os_str().is_empty() {
            missing.push("RELEASE_REPO_PATH");
        }
        missing
    }

    /// Endpoint that receives deployment notifications
    pub fn deploy_endpoint(&self) -> String {
        format!(
            "{}/api/deploy-{}",
            self.deploy_url.as_str().trim_end_matches('/'),
            self.product
        )
    }
}

/// `~/.release_deploy`, or the temp dir when there is no home directory
fn default_state_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".release_deploy")
}

/// Parse an integer variable, clamping to `[min, max]`
fn parse_bounded(
    name: &'static str,
    raw: Option<String>,
    default: u64,
    min: u64,
    max: u64,
) -> Result<u64> {
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .parse::<u64>()
            .map(|v| v.clamp(min, max))
            .map_err(|_| {
                ConfigError::InvalidValue {
                    name,
                    reason: format!("'{}' is not a non-negative integer", raw),
                }
                .into()
            }),
    }
}

fn parse_url(name: &'static str, raw: Option<String>, default: &str) -> Result<Url> {
    let raw = raw.unwrap_or_else(|| default.to_string());
    let url = Url::parse(&raw).map_err(|e| ConfigError::InvalidValue {
        name,
        reason: format!("'{}': {}", raw, e),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidValue {
            name,
            reason: format!("'{}' must be an http(s) URL", raw),
        }
        .into());
    }
    Ok(url)
}

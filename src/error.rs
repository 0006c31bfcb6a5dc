//! Error types for release_deploy operations.
//!
//! Every fatal failure of a run is classified by the stage it can happen in,
//! so the operator knows whether anything was already published. Per-platform
//! failures are modelled separately and never abort a run.

use crate::platform::Platform;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for release_deploy operations
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Main error type for all release_deploy operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Repository or operator preconditions not met
    #[error("Precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    /// Build/check suite failed on the commit being released
    #[error("Verification failed: {0}")]
    Verification(#[from] VerificationError),

    /// Tagging, pushing or release creation failed
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    /// A single platform could not be built or uploaded
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Deployment service notification failed
    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    /// Git command errors outside tagging and pushing
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    /// Run state persistence errors
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// CLI argument and prompt errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// A throttle was closed while a unit of work waited on it
    #[error("Throttle '{name}' is closed")]
    ThrottleClosed {
        /// Throttle name
        name: &'static str,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration errors. Always raised before any side effect.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Required environment variable is unset or empty
    #[error("environment variable {name} cannot be empty")]
    MissingVariable {
        /// Variable name
        name: &'static str,
    },

    /// Optional variable present but malformed
    #[error("invalid value for {name}: {reason}")]
    InvalidValue {
        /// Variable name
        name: &'static str,
        /// Reason for the error
        reason: String,
    },

    /// Resume selector not recognised
    #[error("unknown resume token '{token}' (expected one of: {expected})")]
    UnknownResumeToken {
        /// Token supplied by the operator
        token: String,
        /// Accepted tokens
        expected: String,
    },

    /// Required executable not on PATH
    #[error("required tool '{tool}' not found on PATH")]
    ToolNotFound {
        /// Executable name
        tool: String,
    },

    /// No remote to infer the GitHub repository from
    #[error("no '{remote}' remote to infer the GitHub repository from")]
    MissingRemote {
        /// Remote name
        remote: &'static str,
    },

    /// Source repository path does not exist
    #[error("repository path {path} does not exist")]
    RepositoryNotFound {
        /// Configured path
        path: PathBuf,
    },
}

/// Precondition errors. Raised before tagging or pushing.
#[derive(Error, Debug)]
pub enum PreconditionError {
    /// Tracked files differ from HEAD
    #[error("working copy is not clean: {changes} tracked file(s) modified")]
    DirtyWorkingTree {
        /// Number of modified tracked files
        changes: usize,
        /// Porcelain status lines
        status: Vec<String>,
    },

    /// Operator declined a confirmation
    #[error("deploy cancelled by user: {reason}")]
    UserAborted {
        /// What the operator declined
        reason: String,
    },
}

/// Verification errors. Raised before tagging or pushing.
#[derive(Error, Debug)]
pub enum VerificationError {
    /// The check suite reported failure
    #[error("checks failed on {reference}")]
    ChecksFailed {
        /// Commit the checks ran against
        reference: String,
        /// Diagnostic log from the build environment
        log: String,
    },

    /// The build environment could not be opened
    #[error("opening build environment for {reference}: {reason}")]
    EnvironmentUnavailable {
        /// Tag or commit
        reference: String,
        /// Reason for the error
        reason: String,
    },
}

/// Publish errors. Some of these happen after the tag was pushed.
#[derive(Error, Debug)]
pub enum PublishError {
    /// Creating the signed tag failed
    #[error("creating signed tag {tag}: {reason}")]
    TagFailed {
        /// Tag name
        tag: String,
        /// Reason for the error
        reason: String,
    },

    /// Pushing commits or tags failed
    #[error("{operation}: {reason}")]
    PushFailed {
        /// `git push` or `git push --tags`
        operation: String,
        /// Reason for the error
        reason: String,
    },

    /// Release host rejected or could not be reached for release creation
    #[error("creating release {tag}: {reason}")]
    ReleaseCreationFailed {
        /// Tag name
        tag: String,
        /// Reason for the error
        reason: String,
    },

    /// Uploading an asset to the release failed
    #[error("uploading asset {asset}: {reason}")]
    AssetUploadFailed {
        /// Asset name
        asset: String,
        /// Reason for the error
        reason: String,
    },

    /// Removing an asset from the release failed
    #[error("deleting asset {asset}: {reason}")]
    AssetDeleteFailed {
        /// Asset name
        asset: String,
        /// Reason for the error
        reason: String,
    },

    /// Fetching an asset back from the release failed
    #[error("downloading asset {asset}: {reason}")]
    AssetDownloadFailed {
        /// Asset name
        asset: String,
        /// Reason for the error
        reason: String,
    },

    /// Release host credentials or connectivity check failed
    #[error("release host unavailable: {reason}")]
    HostUnavailable {
        /// Reason for the error
        reason: String,
    },
}

/// Per-platform errors. Logged and recorded, never fatal.
#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    /// Build collaborator failed for this platform
    #[error("building {platform}: {reason}")]
    BuildFailed {
        /// Platform
        platform: Platform,
        /// Reason for the error
        reason: String,
    },

    /// Upload of the built artifact failed
    #[error("uploading {platform}: {reason}")]
    UploadFailed {
        /// Platform
        platform: Platform,
        /// Reason for the error
        reason: String,
    },

    /// The unit of work ended abnormally
    #[error("unit of work for {platform} aborted: {reason}")]
    UnitAborted {
        /// Platform
        platform: Platform,
        /// Reason for the error
        reason: String,
    },
}

impl PlatformError {
    /// Platform this error belongs to
    pub fn platform(&self) -> &Platform {
        match self {
            PlatformError::BuildFailed { platform, .. }
            | PlatformError::UploadFailed { platform, .. }
            | PlatformError::UnitAborted { platform, .. } => platform,
        }
    }
}

/// Deployment notification errors
#[derive(Error, Debug)]
pub enum NotificationError {
    /// Request could not be sent or the response not read
    #[error("network error deploying to {url}: {reason}")]
    Network {
        /// Endpoint
        url: String,
        /// Reason for the error
        reason: String,
    },

    /// Endpoint answered with status >= 400
    #[error("deploy to build server failed, HTTP {status}: {body}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },
}

/// Git command errors
#[derive(Error, Debug)]
pub enum GitError {
    /// Not a git repository
    #[error("{path} is not a git repository")]
    NotRepository {
        /// Path inspected
        path: PathBuf,
    },

    /// A git invocation failed
    #[error("git {command} failed: {reason}")]
    CommandFailed {
        /// Subcommand and arguments
        command: String,
        /// Reason for the error
        reason: String,
    },
}

/// State management errors
#[derive(Error, Debug)]
pub enum StateError {
    /// State file corrupted
    #[error("State file corrupted: {reason}")]
    Corrupted {
        /// Reason for the error
        reason: String,
    },

    /// State file version mismatch
    #[error("State file version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected version
        expected: String,
        /// Found version
        found: String,
    },

    /// Failed to save state
    #[error("Failed to save state: {reason}")]
    SaveFailed {
        /// Reason for the error
        reason: String,
    },

    /// Failed to load state
    #[error("Failed to load state: {reason}")]
    LoadFailed {
        /// Reason for the error
        reason: String,
    },
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Interactive prompt failed
    #[error("Prompt failed: {reason}")]
    PromptFailed {
        /// Reason for the error
        reason: String,
    },
}

impl ReleaseError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ReleaseError::Config(ConfigError::MissingVariable { name }) => vec![
                format!("Export {name} before running the release"),
                "Required: GITHUB_TOKEN, DEVPORTAL_ID, DEVPORTAL_KEY, RELEASE_REPO_PATH".to_string(),
            ],
            ReleaseError::Config(ConfigError::MissingRemote { remote }) => vec![
                "Set RELEASE_GITHUB_REPO=owner/repo".to_string(),
                format!("Or add the remote: git remote add {remote} git@github.com:owner/repo.git"),
            ],
            ReleaseError::Config(ConfigError::UnknownResumeToken { .. }) => vec![
                "Omit --resume to start a new release".to_string(),
                "Use --resume publish if a tag was pushed but a later step failed".to_string(),
            ],
            ReleaseError::Precondition(PreconditionError::DirtyWorkingTree { .. }) => vec![
                "Commit pending changes: git add . && git commit -m 'message'".to_string(),
                "Stash changes temporarily: git stash".to_string(),
            ],
            ReleaseError::Verification(VerificationError::ChecksFailed { .. }) => vec![
                "Fix the failing checks shown in the log above, then start a new release"
                    .to_string(),
            ],
            ReleaseError::Publish(PublishError::TagFailed { .. }) => vec![
                "Check that a signing key is configured: git config user.signingkey".to_string(),
                "Make sure the tag does not already exist: git tag -l".to_string(),
            ],
            ReleaseError::Publish(PublishError::PushFailed { .. }) => vec![
                "Verify git remote access: git remote -v".to_string(),
                "If the tag reached the remote, continue with --resume publish".to_string(),
            ],
            ReleaseError::Publish(PublishError::ReleaseCreationFailed { .. })
            | ReleaseError::Notification(_)
            | ReleaseError::ThrottleClosed { .. } => vec![
                "The tag is already pushed; continue with --resume publish".to_string(),
            ],
            ReleaseError::State(_) => vec![
                "Check that RELEASE_STATE_DIR is writable".to_string(),
                "If the tag reached the remote, continue with --resume publish".to_string(),
            ],
            ReleaseError::Publish(PublishError::HostUnavailable { .. }) => vec![
                "Verify GITHUB_TOKEN is valid and has repo scope".to_string(),
            ],
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }

    /// Check if this error is recoverable by re-invoking the tool
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            ReleaseError::Config(_)
                | ReleaseError::Precondition(PreconditionError::UserAborted { .. })
                | ReleaseError::Verification(_)
        )
    }

    /// Whether external state (a pushed tag) may exist after this error
    pub fn may_have_side_effects(&self) -> bool {
        matches!(
            self,
            ReleaseError::Publish(PublishError::PushFailed { .. })
                | ReleaseError::Publish(PublishError::ReleaseCreationFailed { .. })
                | ReleaseError::Notification(_)
                | ReleaseError::ThrottleClosed { .. }
                | ReleaseError::State(_)
        )
    }
}

//! Release run state tracking and serialization.

use crate::build::BuildArtifact;
use crate::error::{Result, StateError};
use crate::github::HostedRelease;
use crate::platform::Platform;
use crate::version::ReleaseTag;
use serde::{Deserialize, Serialize};

/// Current version of the state format
pub const STATE_FORMAT_VERSION: u32 = 1;

/// Stage of a release run.
///
/// A run moves forward through these in declaration order. `Aborted` is
/// terminal and can be entered from any stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PipelineState {
    /// Nothing has happened yet
    NotStarted,
    /// Preflight checks and confirmations passed
    Checked,
    /// The check suite passed on the release commit
    Verified,
    /// Signed tag created locally
    Tagged,
    /// Branch and tags pushed
    Pushed,
    /// Hosted release exists
    Published,
    /// Platform builds and uploads in progress
    Building,
    /// Every platform unit finished
    Fanned,
    /// Deployment service notified
    Notified,
    /// Run completed
    Done,
    /// Run stopped on a fatal error
    Aborted,
}

impl PipelineState {
    /// Whether the tag may already be on the remote in this state
    pub fn is_after_push(self) -> bool {
        self >= PipelineState::Pushed && self != PipelineState::Aborted
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineState::NotStarted => "not started",
            PipelineState::Checked => "checked",
            PipelineState::Verified => "verified",
            PipelineState::Tagged => "tagged",
            PipelineState::Pushed => "pushed",
            PipelineState::Published => "published",
            PipelineState::Building => "building",
            PipelineState::Fanned => "fanned in",
            PipelineState::Notified => "notified",
            PipelineState::Done => "done",
            PipelineState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Checkpoint in the release run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// State reached
    pub phase: PipelineState,
    /// When it was reached
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Data recorded with the checkpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Asset uploaded to the hosted release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Platform the asset was built for; `None` for the checksum list
    #[serde(default)]
    pub platform: Option<Platform>,
    /// Asset name
    pub name: String,
    /// Hex SHA-256 of the asset
    pub sha256: String,
}

impl AssetRecord {
    /// `SHA256SUMS` line for this asset
    pub fn checksum_line(&self) -> String {
        format!("{}  {}", self.sha256, self.name)
    }
}

/// Platform whose unit failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedPlatform {
    /// Platform
    pub platform: Platform,
    /// Failure description
    pub reason: String,
}

/// Fatal error recorded against a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedError {
    /// Error message
    pub message: String,
    /// State the run was in
    pub phase: PipelineState,
    /// When it happened
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Whether re-running can recover
    pub recoverable: bool,
}

/// Persistent state of one release run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseState {
    /// Version of the state format
    pub format_version: u32,
    /// Incremented on every save
    pub save_version: u64,
    /// Tag being released
    pub tag: ReleaseTag,
    /// Whether the tag is a pre-release
    pub prerelease: bool,
    /// When the run started
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// When the state last changed
    pub updated_at: chrono::DateTime<chrono::Utc>,
    /// Current stage
    pub phase: PipelineState,
    /// Stages reached
    pub checkpoints: Vec<Checkpoint>,
    /// Hosted release, once created
    #[serde(default)]
    pub hosted_release: Option<HostedRelease>,
    /// Assets uploaded so far
    #[serde(default)]
    pub uploaded_assets: Vec<AssetRecord>,
    /// Platforms that failed in the most recent fan-out
    #[serde(default)]
    pub failed_platforms: Vec<FailedPlatform>,
    /// Fatal errors
    #[serde(default)]
    pub errors: Vec<RecordedError>,
}

impl ReleaseState {
    /// Fresh state for `tag`
    pub fn new(tag: ReleaseTag) -> Self {
        let now = chrono::Utc::now();
        Self {
            format_version: STATE_FORMAT_VERSION,
            save_version: 0,
            prerelease: tag.is_prerelease(),
            tag,
            started_at: now,
            updated_at: now,
            phase: PipelineState::NotStarted,
            checkpoints: Vec::new(),
            hosted_release: None,
            uploaded_assets: Vec::new(),
            failed_platforms: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Move to `phase` and record a checkpoint for it
    pub fn add_checkpoint(&mut self, phase: PipelineState, data: Option<serde_json::Value>) {
        let now = chrono::Utc::now();
        self.phase = phase;
        self.checkpoints.push(Checkpoint {
            phase,
            timestamp: now,
            data,
        });
        self.updated_at = now;
    }

    /// Whether `phase` was reached at some point
    pub fn has_completed(&self, phase: PipelineState) -> bool {
        self.checkpoints.iter().any(|cp| cp.phase == phase)
    }

    /// Set current stage without a checkpoint
    pub fn set_phase(&mut self, phase: PipelineState) {
        self.phase = phase;
        self.updated_at = chrono::Utc::now();
    }

    /// Record a fatal error
    pub fn add_error(&mut self, message: String, recoverable: bool) {
        let now = chrono::Utc::now();
        self.errors.push(RecordedError {
            message,
            phase: self.phase,
            timestamp: now,
            recoverable,
        });
        self.updated_at = now;
    }

    /// Remember the hosted release
    pub fn set_hosted_release(&mut self, release: HostedRelease) {
        self.hosted_release = Some(release);
        self.updated_at = chrono::Utc::now();
    }

    /// Drop a hosted release that no longer exists, with everything uploaded to it
    pub fn forget_release(&mut self) -> Option<HostedRelease> {
        self.uploaded_assets.clear();
        self.updated_at = chrono::Utc::now();
        self.hosted_release.take()
    }

    /// Record an uploaded build artifact
    pub fn record_upload(&mut self, artifact: &BuildArtifact) {
        self.record_asset(AssetRecord {
            platform: Some(artifact.platform.clone()),
            name: artifact.name.clone(),
            sha256: artifact.sha256.clone(),
        });
        self.failed_platforms.retain(|f| f.platform != artifact.platform);
    }

    /// Record an uploaded asset, replacing an earlier record of the same name
    pub fn record_asset(&mut self, record: AssetRecord) {
        self.uploaded_assets.retain(|a| a.name != record.name);
        self.uploaded_assets.push(record);
        self.updated_at = chrono::Utc::now();
    }

    /// Forget an asset that was removed from the release
    pub fn forget_asset(&mut self, name: &str) {
        self.uploaded_assets.retain(|a| a.name != name);
        self.updated_at = chrono::Utc::now();
    }

    /// Record a failed platform unit
    pub fn record_failure(&mut self, platform: Platform, reason: String) {
        self.failed_platforms.retain(|f| f.platform != platform);
        self.failed_platforms.push(FailedPlatform { platform, reason });
        self.updated_at = chrono::Utc::now();
    }

    /// Whether an asset with this name is already on the release
    pub fn is_uploaded(&self, name: &str) -> bool {
        self.uploaded_assets.iter().any(|a| a.name == name)
    }

    /// Uploaded platform assets, for the checksum list
    pub fn platform_assets(&self) -> impl Iterator<Item = &AssetRecord> {
        self.uploaded_assets.iter().filter(|a| a.platform.is_some())
    }

    /// Check format compatibility
    pub fn validate(&self) -> Result<()> {
        if self.format_version != STATE_FORMAT_VERSION {
            return Err(StateError::VersionMismatch {
                expected: STATE_FORMAT_VERSION.to_string(),
                found: self.format_version.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// One-line description for the operator
    pub fn summary(&self) -> String {
        format!(
            "Release {} ({}) - {} asset(s) uploaded, {} platform(s) failed - {} elapsed",
            self.tag,
            self.phase,
            self.platform_assets().count(),
            self.failed_platforms.len(),
            format_duration(self.updated_at - self.started_at)
        )
    }
}

fn format_duration(duration: chrono::Duration) -> String {
    let total_seconds = duration.num_seconds();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

//! The release pipeline.
//!
//! A new run is entered at [`PipelineState::Checked`], after preflight:
//!
//! 1. run the check suite on HEAD, then verify release host access
//! 2. create the signed tag, push the branch and the tags
//! 3. wait for the host to see the tag, then create the hosted release
//! 4. build and upload every platform concurrently, bounded by two throttles
//! 5. upload `SHA256SUMS`, notify deployment for final releases
//!
//! A resumed run enters at step 3 for the most recent tag. Progress is
//! persisted from tagging onwards, and after every platform unit. A resumed
//! run asks the host what the release already holds, reuses it and skips the
//! platforms found there.

mod checksums;
mod fanout;
mod resume;

pub use crate::state::PipelineState;
pub use checksums::CHECKSUMS_ASSET;
pub use fanout::{FanOutReport, UnitResult};
pub use resume::{CONFIRM_RESUME, ResumeController, ResumeToken};

use crate::build::{BuildArtifact, BuildBackend, BuildEnvironment, Plugin, sha256_file};
use crate::cli::RuntimeConfig;
use crate::config::EnvConfig;
use crate::error::{PlatformError, Result, VerificationError};
use crate::git::GitOperations;
use crate::github::{HostedRelease, NewRelease, ReleaseHost};
use crate::notify::DeploymentNotifier;
use crate::platform::{Platform, release_platforms};
use crate::state::{AssetRecord, ReleaseState, StateManager};
use crate::throttle::Throttle;
use crate::version::ReleaseTag;
use fanout::{FanOut, UnitContext};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Message of the signed tag
const TAG_MESSAGE: &str = "";

/// Tunables of a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Product name used in asset names
    pub product: String,
    /// Platforms to build, already filtered
    pub platforms: Vec<Platform>,
    /// Build throttle capacity
    pub build_concurrency: usize,
    /// Upload throttle capacity
    pub upload_concurrency: usize,
    /// Wait between push and release creation
    pub publish_delay: Duration,
    /// Plugins compiled into release builds
    pub plugins: Vec<Plugin>,
}

impl PipelineSettings {
    /// Settings from the environment, with the release platform matrix
    pub fn from_config(config: &EnvConfig) -> Result<Self> {
        Ok(Self {
            product: config.product.clone(),
            platforms: release_platforms(&config.skip_platforms)?,
            build_concurrency: config.build_concurrency,
            upload_concurrency: config.upload_concurrency,
            publish_delay: config.publish_delay,
            plugins: Vec::new(),
        })
    }
}

/// Which release to run and where to enter the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    /// Tag being released
    pub tag: ReleaseTag,
    /// [`PipelineState::Checked`] for a new release, [`PipelineState::Published`] to resume
    pub start: PipelineState,
}

impl RunPlan {
    /// A new release of `tag`
    pub fn new_release(tag: ReleaseTag) -> Self {
        Self {
            tag,
            start: PipelineState::Checked,
        }
    }

    /// Resume the release of an already pushed `tag`
    pub fn resume(tag: ReleaseTag, token: ResumeToken) -> Self {
        Self {
            tag,
            start: token.entry_state(),
        }
    }

    /// Whether the tag is already on the remote
    pub fn is_resume(&self) -> bool {
        self.start >= PipelineState::Published
    }
}

/// Summary of a successful run
#[derive(Debug)]
pub struct ReleaseOutcome {
    /// Released tag
    pub tag: ReleaseTag,
    /// Hosted release the assets went to
    pub release: HostedRelease,
    /// Artifacts uploaded by this run
    pub uploaded: Vec<BuildArtifact>,
    /// Platform units that failed
    pub failed: Vec<PlatformError>,
    /// Platforms skipped because their asset was already uploaded
    pub skipped: Vec<Platform>,
    /// Platform units spawned by this run
    pub spawned_units: usize,
    /// Whether `SHA256SUMS` was uploaded
    pub checksums_uploaded: bool,
    /// Whether the deployment service was notified
    pub notified: bool,
}

/// Orchestrates one release over its collaborators
pub struct ReleasePipeline<G, B, H, N> {
    git: G,
    backend: B,
    host: Arc<H>,
    notifier: N,
    settings: PipelineSettings,
    runtime: RuntimeConfig,
    state_manager: Option<StateManager>,
    state: PipelineState,
    history: Vec<PipelineState>,
    durable: bool,
    fan_out_started: bool,
}

impl<G, B, H, N> ReleasePipeline<G, B, H, N>
where
    G: GitOperations,
    B: BuildBackend,
    H: ReleaseHost,
    N: DeploymentNotifier,
{
    /// Create a pipeline
    pub fn new(
        git: G,
        backend: B,
        host: H,
        notifier: N,
        settings: PipelineSettings,
        runtime: RuntimeConfig,
    ) -> Self {
        Self {
            git,
            backend,
            host: Arc::new(host),
            notifier,
            settings,
            runtime,
            state_manager: None,
            state: PipelineState::NotStarted,
            history: Vec::new(),
            durable: false,
            fan_out_started: false,
        }
    }

    /// Persist run progress through `manager`
    pub fn with_state_manager(mut self, manager: StateManager) -> Self {
        self.state_manager = Some(manager);
        self
    }

    /// Current stage
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Every stage entered so far, in order
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// Whether platform units were started, even if the run later failed
    pub fn fan_out_started(&self) -> bool {
        self.fan_out_started
    }

    /// Whether the tag may already be on the remote, so a failed run is
    /// continued with `--resume publish` rather than started over
    pub fn tag_pushed(&self) -> bool {
        self.history.iter().any(|state| state.is_after_push())
    }

    /// Repository the pipeline tags and pushes
    pub fn git(&self) -> &G {
        &self.git
    }

    /// Release host the pipeline publishes to
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Notifier the pipeline reports to
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Execute the plan. On failure the pipeline ends in `Aborted`.
    pub async fn run(&mut self, plan: RunPlan) -> Result<ReleaseOutcome> {
        let mut record = self.initial_record(&plan).await;

        match self.execute(&plan, &mut record).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                log::error!("release {} aborted while {}: {}", plan.tag, self.state, e);
                record.add_error(e.to_string(), e.is_recoverable());
                self.enter(PipelineState::Aborted);
                record.set_phase(PipelineState::Aborted);
                if self.durable
                    && let Err(save_error) = self.persist(&mut record).await
                {
                    log::warn!("could not record failure: {}", save_error);
                }
                Err(e)
            }
        }
    }

    async fn initial_record(&self, plan: &RunPlan) -> ReleaseState {
        let Some(manager) = self.state_manager.as_ref().filter(|_| plan.is_resume()) else {
            return ReleaseState::new(plan.tag.clone());
        };

        let loaded = match manager.load_if_exists().await {
            Ok(loaded) => loaded,
            Err(e) => {
                self.runtime
                    .warning_println(&format!("Ignoring recorded progress: {}", e));
                None
            }
        };

        if let Some(loaded) = loaded {
            for warning in &loaded.warnings {
                self.runtime.warning_println(warning);
            }
            if loaded.state.tag == plan.tag {
                self.runtime
                    .verbose_println(&format!("Recorded progress: {}", loaded.state.summary()));
                return loaded.state;
            }
            log::warn!(
                "ignoring recorded state for {} while resuming {}",
                loaded.state.tag,
                plan.tag
            );
        }
        ReleaseState::new(plan.tag.clone())
    }

    async fn execute(&mut self, plan: &RunPlan, record: &mut ReleaseState) -> Result<ReleaseOutcome> {
        let tag = &plan.tag;

        if plan.is_resume() {
            self.durable = true;
            if record.has_completed(PipelineState::Tagged)
                && !record.has_completed(PipelineState::Pushed)
            {
                self.runtime
                    .warning_println(&format!("{} was tagged but never pushed", tag));
                self.push(record).await?;
            }
        } else {
            self.checkpoint(record, PipelineState::Checked).await?;
            self.verify().await?;
            self.checkpoint(record, PipelineState::Verified).await?;

            self.host.verify_access().await?;

            self.runtime.progress_println(&format!("Creating signed tag {}", tag));
            self.git.create_signed_tag(tag, TAG_MESSAGE).await?;
            self.durable = true;
            self.checkpoint(record, PipelineState::Tagged).await?;

            self.push(record).await?;

            if !self.settings.publish_delay.is_zero() {
                self.runtime.verbose_println(&format!(
                    "Waiting {}s before publishing the release",
                    self.settings.publish_delay.as_secs()
                ));
                tokio::time::sleep(self.settings.publish_delay).await;
            }
        }

        let release = self.publish(plan, record).await?;
        self.checkpoint(record, PipelineState::Published).await?;

        let (report, skipped) = self.build_and_upload(tag, &release, record).await?;
        self.checkpoint(record, PipelineState::Fanned).await?;

        // Nothing new and the list is already there, or there is nothing to list
        let checksums_uploaded = if report.uploaded.is_empty()
            && (has_checksums(&release, record) || skipped.is_empty())
        {
            false
        } else {
            self.upload_checksums(tag, &release, record).await
        };

        let notified = if tag.is_prerelease() {
            self.runtime
                .verbose_println(&format!("{} is a pre-release, not deploying", tag));
            false
        } else {
            self.runtime.progress_println("Deploying to build server");
            self.notifier.notify(tag).await?;
            self.runtime
                .success_println("Deploy request successfully sent to build server");
            self.checkpoint(record, PipelineState::Notified).await?;
            true
        };

        self.enter(PipelineState::Done);
        record.add_checkpoint(PipelineState::Done, None);
        self.discard_record();

        Ok(ReleaseOutcome {
            tag: tag.clone(),
            release,
            uploaded: report.uploaded,
            failed: report.failed,
            skipped,
            spawned_units: report.spawned,
            checksums_uploaded,
            notified,
        })
    }

    /// Run the check suite on the commit being released
    async fn verify(&self) -> Result<()> {
        let head = self.git.head_commit().await?;
        self.runtime.progress_println(&format!("Running checks on {}", head));

        let environment = self.backend.open(&head, &[]).await?;
        let report = environment.run_checks().await?;
        if !report.passed {
            return Err(VerificationError::ChecksFailed {
                reference: head,
                log: report.log,
            }
            .into());
        }

        self.runtime.success_println("Checks passed");
        Ok(())
    }

    async fn push(&mut self, record: &mut ReleaseState) -> Result<()> {
        self.runtime.progress_println("Pushing commits and tags");
        self.git.push().await?;
        self.git.push_tags().await?;
        self.checkpoint(record, PipelineState::Pushed).await
    }

    /// Reuse the existing hosted release, or create it.
    ///
    /// On resume the host is asked even when a release was recorded, because
    /// the recorded asset list is only as fresh as the last save.
    async fn publish(&self, plan: &RunPlan, record: &mut ReleaseState) -> Result<HostedRelease> {
        if plan.is_resume() {
            if let Some(existing) = self.host.find_release(&plan.tag).await? {
                let verb = match &record.hosted_release {
                    Some(recorded) if recorded.id == existing.id => "Reusing",
                    _ => "Found existing",
                };
                self.runtime.println(&format!(
                    "{} release {} ({}, {} asset(s))",
                    verb,
                    plan.tag,
                    existing.html_url,
                    existing.assets.len()
                ));
                record.set_hosted_release(existing.clone());
                return Ok(existing);
            }

            if let Some(gone) = record.forget_release() {
                log::warn!("recorded release {} for {} is gone from the host", gone.id, plan.tag);
                self.runtime.warning_println(&format!(
                    "Recorded release {} no longer exists, publishing it again",
                    gone.html_url
                ));
            }
        }

        self.runtime.progress_println("Publishing release");
        let created = self.host.create_release(&NewRelease::for_tag(&plan.tag)).await?;
        self.runtime
            .success_println(&format!("Published release {}", created.html_url));
        record.set_hosted_release(created.clone());
        Ok(created)
    }

    async fn build_and_upload(
        &mut self,
        tag: &ReleaseTag,
        release: &HostedRelease,
        record: &mut ReleaseState,
    ) -> Result<(FanOutReport, Vec<Platform>)> {
        let (pending, skipped): (Vec<Platform>, Vec<Platform>) =
            self.settings.platforms.iter().cloned().partition(|platform| {
                let name = platform.artifact_name(&self.settings.product, tag.as_str());
                !(record.is_uploaded(&name) || release.assets.contains(&name))
            });
        for platform in &skipped {
            self.runtime
                .indent(&format!("Skipping {} (already uploaded)", platform));
        }

        self.runtime.section("Preparing builds");
        let environment = self.backend.open(tag.as_str(), &self.settings.plugins).await?;
        let workdir = tempfile::Builder::new()
            .prefix(&format!("{}_deployment_", self.settings.product))
            .tempdir()?;

        let context = Arc::new(UnitContext {
            environment: Arc::new(environment),
            host: Arc::clone(&self.host),
            release_id: release.id,
            tag: tag.clone(),
            product: self.settings.product.clone(),
            workdir: workdir.path().to_path_buf(),
            builds: Throttle::new("builds", self.settings.build_concurrency),
            uploads: Throttle::new("uploads", self.settings.upload_concurrency),
            runtime: self.runtime.clone(),
        });

        self.fan_out_started = true;
        self.checkpoint(record, PipelineState::Building).await?;
        let mut units = FanOut::start(context, pending);
        while let Some(result) = units.next_finished().await {
            match &result {
                Ok(artifact) => record.record_upload(artifact),
                Err(failure) => record.record_failure(failure.platform().clone(), failure.to_string()),
            }
            // Units keep running; the next save or the final one catches up
            if let Err(e) = self.persist(record).await {
                log::warn!("recording platform progress: {}", e);
            }
        }
        let report = units.into_report();

        self.runtime.println(&format!(
            "{} of {} platform(s) uploaded, {} failed, {} skipped",
            report.uploaded.len(),
            report.spawned,
            report.failed.len(),
            skipped.len()
        ));
        for failure in &report.failed {
            self.runtime.indent(&failure.to_string());
        }

        drop(workdir);
        Ok((report, skipped))
    }

    /// Publish the checksum list; failures are logged, not fatal
    async fn upload_checksums(
        &self,
        tag: &ReleaseTag,
        release: &HostedRelease,
        record: &mut ReleaseState,
    ) -> bool {
        match self.publish_checksums(tag, release, record).await {
            Ok(entries) => {
                self.runtime
                    .success_println(&format!("Uploaded {} ({} entries)", CHECKSUMS_ASSET, entries));
                true
            }
            Err(e) => {
                log::warn!("uploading {}: {}", CHECKSUMS_ASSET, e);
                self.runtime
                    .warning_println(&format!("Could not upload {}: {}", CHECKSUMS_ASSET, e));
                false
            }
        }
    }

    /// Write the list for every archive on the release, replacing an older list
    async fn publish_checksums(
        &self,
        tag: &ReleaseTag,
        release: &HostedRelease,
        record: &mut ReleaseState,
    ) -> Result<usize> {
        let dir = tempfile::tempdir()?;
        let replacing = has_checksums(release, record);
        let published = if replacing {
            self.published_checksums(release.id, dir.path()).await
        } else {
            HashMap::new()
        };

        // Archives from earlier runs this record never saw being uploaded
        for platform in &self.settings.platforms {
            let name = platform.artifact_name(&self.settings.product, tag.as_str());
            if record.is_uploaded(&name) || !release.assets.contains(&name) {
                continue;
            }
            let sha256 = match published.get(&name) {
                Some(sha256) => sha256.clone(),
                None => match self.hash_hosted_asset(release.id, &name, dir.path()).await {
                    Ok(sha256) => sha256,
                    Err(e) => {
                        log::warn!("leaving {} out of {}: {}", name, CHECKSUMS_ASSET, e);
                        continue;
                    }
                },
            };
            record.record_asset(AssetRecord {
                platform: Some(platform.clone()),
                name,
                sha256,
            });
        }

        let entries = record.platform_assets().count();
        let path = dir.path().join(CHECKSUMS_ASSET);
        tokio::fs::write(&path, checksums::render(record.platform_assets())).await?;
        let sha256 = sha256_file(&path).await?;

        if replacing {
            self.host.delete_asset(release.id, CHECKSUMS_ASSET).await?;
            record.forget_asset(CHECKSUMS_ASSET);
        }
        self.host.upload_asset(release.id, CHECKSUMS_ASSET, &path).await?;
        record.record_asset(AssetRecord {
            platform: None,
            name: CHECKSUMS_ASSET.to_string(),
            sha256,
        });
        Ok(entries)
    }

    /// Entries of the list already on the release; empty if it cannot be read
    async fn published_checksums(&self, release_id: u64, dir: &Path) -> HashMap<String, String> {
        let path = dir.join(format!("{}.published", CHECKSUMS_ASSET));
        let fetched = async {
            self.host.download_asset(release_id, CHECKSUMS_ASSET, &path).await?;
            Ok::<_, crate::ReleaseError>(tokio::fs::read_to_string(&path).await?)
        }
        .await;

        match fetched {
            Ok(contents) => checksums::parse(&contents),
            Err(e) => {
                log::warn!("reading the published {}: {}", CHECKSUMS_ASSET, e);
                HashMap::new()
            }
        }
    }

    async fn hash_hosted_asset(&self, release_id: u64, name: &str, dir: &Path) -> Result<String> {
        let path = dir.join(name);
        self.host.download_asset(release_id, name, &path).await?;
        let sha256 = sha256_file(&path).await;
        if let Err(e) = tokio::fs::remove_file(&path).await {
            log::warn!("removing {}: {}", path.display(), e);
        }
        sha256
    }

    fn enter(&mut self, state: PipelineState) {
        log::debug!("pipeline: {} -> {}", self.state, state);
        self.state = state;
        self.history.push(state);
    }

    async fn checkpoint(&mut self, record: &mut ReleaseState, state: PipelineState) -> Result<()> {
        self.enter(state);
        record.add_checkpoint(state, None);
        if self.durable {
            self.persist(record).await?;
        }
        Ok(())
    }

    async fn persist(&self, record: &mut ReleaseState) -> Result<()> {
        if let Some(manager) = &self.state_manager {
            manager.save_state(record).await?;
        }
        Ok(())
    }

    fn discard_record(&self) {
        if let Some(manager) = &self.state_manager
            && let Err(e) = manager.cleanup_state()
        {
            log::warn!("removing {}: {}", manager.path().display(), e);
        }
    }
}

fn has_checksums(release: &HostedRelease, record: &ReleaseState) -> bool {
    record.is_uploaded(CHECKSUMS_ASSET) || release.assets.iter().any(|a| a == CHECKSUMS_ASSET)
}

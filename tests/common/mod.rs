//! In-memory collaborators for driving the pipeline without git, a builder
//! or the network.

#![allow(dead_code)]

use rand::Rng;
use release_deploy::build::{BuildBackend, BuildEnvironment, CheckReport, Plugin};
use release_deploy::cli::RuntimeConfig;
use release_deploy::error::{
    CliError, NotificationError, PlatformError, PublishError, ReleaseError, Result,
};
use release_deploy::git::GitOperations;
use release_deploy::github::{HostedRelease, NewRelease, ReleaseHost, UploadedAsset};
use release_deploy::notify::DeploymentNotifier;
use release_deploy::pipeline::{CHECKSUMS_ASSET, PipelineSettings, ReleasePipeline};
use release_deploy::platform::Platform;
use release_deploy::prompt::Prompter;
use release_deploy::version::ReleaseTag;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub type TestPipeline = ReleasePipeline<FakeGit, FakeBackend, FakeHost, FakeNotifier>;

pub fn six_platforms() -> Vec<Platform> {
    vec![
        Platform::new("darwin", "amd64", ""),
        Platform::new("freebsd", "amd64", ""),
        Platform::new("linux", "386", ""),
        Platform::new("linux", "amd64", ""),
        Platform::new("linux", "arm", "7"),
        Platform::new("windows", "amd64", ""),
    ]
}

pub fn settings(platforms: Vec<Platform>) -> PipelineSettings {
    PipelineSettings {
        product: "caddy".to_string(),
        platforms,
        build_concurrency: 2,
        upload_concurrency: 3,
        publish_delay: Duration::ZERO,
        plugins: Vec::new(),
    }
}

pub fn pipeline(
    git: FakeGit,
    backend: FakeBackend,
    host: FakeHost,
    notifier: FakeNotifier,
    settings: PipelineSettings,
) -> TestPipeline {
    ReleasePipeline::new(git, backend, host, notifier, settings, RuntimeConfig::quiet())
}

pub fn tag(label: &str) -> ReleaseTag {
    ReleaseTag::parse(label).unwrap()
}

pub fn asset_name(platform: &Platform, tag: &str) -> String {
    platform.artifact_name("caddy", tag)
}

/// Bumps `current` and folds it into `max`
fn enter(current: &AtomicUsize, max: &AtomicUsize) {
    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
    max.fetch_max(now, Ordering::SeqCst);
}

fn random_pause(max_ms: u64) -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

// ---------------------------------------------------------------------------
// git

#[derive(Debug, Default)]
pub struct FakeGit {
    pub tags: Vec<String>,
    pub changes: Vec<String>,
    pub fail_push: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeGit {
    pub fn with_tags(tags: &[&str]) -> Self {
        Self {
            tags: tags.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    pub fn dirty(mut self, changes: &[&str]) -> Self {
        self.changes = changes.iter().map(ToString::to_string).collect();
        self
    }

    pub fn failing_push(mut self) -> Self {
        self.fail_push = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that change the repository or the remote
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with("tag") || c.starts_with("push"))
            .collect()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

impl GitOperations for FakeGit {
    async fn list_tags(&self) -> Result<Vec<String>> {
        self.record("list_tags");
        Ok(self.tags.clone())
    }

    async fn tracked_changes(&self) -> Result<Vec<String>> {
        self.record("status");
        Ok(self.changes.clone())
    }

    async fn head_commit(&self) -> Result<String> {
        self.record("head");
        Ok("4f1c2e9d0b7a6c5e4f3a2b1c0d9e8f7a6b5c4d3e".to_string())
    }

    async fn commit_summary(&self) -> Result<String> {
        self.record("show");
        Ok("commit 4f1c2e9\nAuthor: Release Manager\n\n    Prepare release\n".to_string())
    }

    async fn create_signed_tag(&self, tag: &ReleaseTag, _message: &str) -> Result<()> {
        self.record(format!("tag {}", tag));
        Ok(())
    }

    async fn push(&self) -> Result<()> {
        self.record("push");
        if self.fail_push {
            return Err(PublishError::PushFailed {
                operation: "git push".to_string(),
                reason: "remote hung up".to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn push_tags(&self) -> Result<()> {
        self.record("push --tags");
        Ok(())
    }

    async fn remote_url(&self, _remote: &str) -> Result<Option<String>> {
        Ok(Some("git@github.com:caddyserver/caddy.git".to_string()))
    }
}

// ---------------------------------------------------------------------------
// build

/// Counters shared between a backend, its environments and the test
#[derive(Debug, Default)]
pub struct BuildStats {
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub builds: AtomicUsize,
    pub opened: Mutex<Vec<String>>,
    pub built: Mutex<Vec<Platform>>,
}

impl BuildStats {
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    pub stats: Arc<BuildStats>,
    pub checks_fail: bool,
    pub failing: HashSet<Platform>,
    pub panicking: HashSet<Platform>,
    pub hanging: HashSet<Platform>,
    pub max_pause_ms: u64,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_checks(mut self) -> Self {
        self.checks_fail = true;
        self
    }

    pub fn failing_on(mut self, platform: Platform) -> Self {
        self.failing.insert(platform);
        self
    }

    pub fn panicking_on(mut self, platform: Platform) -> Self {
        self.panicking.insert(platform);
        self
    }

    /// The build for `platform` never returns
    pub fn hanging_on(mut self, platform: Platform) -> Self {
        self.hanging.insert(platform);
        self
    }

    pub fn with_random_pauses(mut self, max_ms: u64) -> Self {
        self.max_pause_ms = max_ms;
        self
    }
}

impl BuildBackend for FakeBackend {
    type Environment = FakeEnvironment;

    async fn open(&self, reference: &str, _plugins: &[Plugin]) -> Result<FakeEnvironment> {
        self.stats.opened.lock().unwrap().push(reference.to_string());
        Ok(FakeEnvironment {
            backend: self.clone(),
        })
    }
}

#[derive(Debug)]
pub struct FakeEnvironment {
    backend: FakeBackend,
}

impl BuildEnvironment for FakeEnvironment {
    async fn run_checks(&self) -> Result<CheckReport> {
        Ok(CheckReport {
            passed: !self.backend.checks_fail,
            log: "--- FAIL: TestServe (0.00s)".to_string(),
        })
    }

    async fn build(&self, platform: &Platform, tag: &ReleaseTag, output: &Path) -> Result<()> {
        let stats = &self.backend.stats;
        enter(&stats.in_flight, &stats.max_in_flight);
        stats.builds.fetch_add(1, Ordering::SeqCst);

        let pause = random_pause(self.backend.max_pause_ms);
        tokio::time::sleep(pause).await;

        if self.backend.hanging.contains(platform) {
            stats.in_flight.fetch_sub(1, Ordering::SeqCst);
            std::future::pending::<()>().await;
        }

        if self.backend.panicking.contains(platform) {
            stats.in_flight.fetch_sub(1, Ordering::SeqCst);
            panic!("builder crashed on {}", platform);
        }

        let result = if self.backend.failing.contains(platform) {
            Err(PlatformError::BuildFailed {
                platform: platform.clone(),
                reason: "exit status 2".to_string(),
            }
            .into())
        } else {
            tokio::fs::write(output, format!("{} {}", tag, platform))
                .await
                .map_err(ReleaseError::from)
                .map(|_| stats.built.lock().unwrap().push(platform.clone()))
        };

        stats.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn log(&self) -> String {
        "==> build log".to_string()
    }
}

// ---------------------------------------------------------------------------
// release host

/// Release host keeping one release and the bytes of its assets. Like GitHub,
/// it refuses a second asset with the same name.
#[derive(Debug, Default)]
pub struct FakeHost {
    pub fail_create: bool,
    pub fail_verify: bool,
    pub failing_assets: HashSet<String>,
    pub max_pause_ms: u64,
    pub created: Mutex<Vec<NewRelease>>,
    pub uploads: Mutex<Vec<(u64, String, PathBuf)>>,
    pub deleted: Mutex<Vec<String>>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    release: Mutex<Option<HostedRelease>>,
    contents: Mutex<HashMap<String, Vec<u8>>>,
    next_id: AtomicU64,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(41),
            ..Self::default()
        }
    }

    /// A release that already exists, with placeholder bytes for its assets
    pub fn with_existing(self, release: HostedRelease) -> Self {
        {
            let mut contents = self.contents.lock().unwrap();
            for name in &release.assets {
                contents.insert(name.clone(), format!("existing {}", name).into_bytes());
            }
        }
        *self.release.lock().unwrap() = Some(release);
        self
    }

    /// What `other` holds now, as seen by a later run
    pub fn resumed_from(other: &FakeHost) -> Self {
        let host = Self::new();
        *host.release.lock().unwrap() = other.release();
        *host.contents.lock().unwrap() = other.contents.lock().unwrap().clone();
        host.next_id
            .store(other.next_id.load(Ordering::SeqCst), Ordering::SeqCst);
        host
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn failing_upload(mut self, asset: &str) -> Self {
        self.failing_assets.insert(asset.to_string());
        self
    }

    pub fn with_random_pauses(mut self, max_ms: u64) -> Self {
        self.max_pause_ms = max_ms;
        self
    }

    pub fn release(&self) -> Option<HostedRelease> {
        self.release.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<NewRelease> {
        self.created.lock().unwrap().clone()
    }

    /// Names uploaded through this host, sorted
    pub fn uploaded_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .uploads
            .lock()
            .unwrap()
            .iter()
            .map(|(_, name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn uploaded_paths(&self) -> Vec<PathBuf> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, path)| path.clone())
            .collect()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Current `SHA256SUMS` on the release
    pub fn checksums(&self) -> Option<String> {
        self.contents
            .lock()
            .unwrap()
            .get(CHECKSUMS_ASSET)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    fn release_with(&self, release_id: u64) -> Option<HostedRelease> {
        self.release().filter(|release| release.id == release_id)
    }
}

impl ReleaseHost for FakeHost {
    async fn verify_access(&self) -> Result<()> {
        if self.fail_verify {
            return Err(PublishError::HostUnavailable {
                reason: "401 Bad credentials".to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn find_release(&self, _tag: &ReleaseTag) -> Result<Option<HostedRelease>> {
        Ok(self.release())
    }

    async fn create_release(&self, release: &NewRelease) -> Result<HostedRelease> {
        if self.fail_create {
            return Err(PublishError::ReleaseCreationFailed {
                tag: release.tag.to_string(),
                reason: "connection reset by peer".to_string(),
            }
            .into());
        }
        self.created.lock().unwrap().push(release.clone());
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let hosted = HostedRelease {
            id,
            html_url: format!("https://github.com/caddyserver/caddy/releases/tag/{}", release.tag),
            assets: Vec::new(),
        };
        *self.release.lock().unwrap() = Some(hosted.clone());
        self.contents.lock().unwrap().clear();
        Ok(hosted)
    }

    async fn upload_asset(&self, release_id: u64, name: &str, path: &Path) -> Result<UploadedAsset> {
        enter(&self.in_flight, &self.max_in_flight);

        let pause = random_pause(self.max_pause_ms);
        tokio::time::sleep(pause).await;

        let rejected = |reason: &str| -> ReleaseError {
            PublishError::AssetUploadFailed {
                asset: name.to_string(),
                reason: reason.to_string(),
            }
            .into()
        };

        let result = match tokio::fs::read(path).await {
            Err(e) => Err(ReleaseError::from(e)),
            Ok(_) if self.failing_assets.contains(name) => Err(rejected("HTTP 502")),
            Ok(bytes) => {
                let mut release = self.release.lock().unwrap();
                match release.as_mut().filter(|r| r.id == release_id) {
                    None => Err(rejected("404 release not found")),
                    Some(r) if r.assets.iter().any(|a| a == name) => {
                        Err(rejected("422 already_exists"))
                    }
                    Some(r) => {
                        r.assets.push(name.to_string());
                        let size = bytes.len() as u64;
                        self.contents.lock().unwrap().insert(name.to_string(), bytes);
                        self.uploads
                            .lock()
                            .unwrap()
                            .push((release_id, name.to_string(), path.to_path_buf()));
                        Ok(UploadedAsset {
                            name: name.to_string(),
                            size,
                            download_url: format!("https://example.invalid/{}", name),
                        })
                    }
                }
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn delete_asset(&self, release_id: u64, name: &str) -> Result<bool> {
        let mut release = self.release.lock().unwrap();
        let Some(r) = release.as_mut().filter(|r| r.id == release_id) else {
            return Ok(false);
        };
        let before = r.assets.len();
        r.assets.retain(|a| a != name);
        self.contents.lock().unwrap().remove(name);
        self.deleted.lock().unwrap().push(name.to_string());
        Ok(r.assets.len() < before)
    }

    async fn download_asset(&self, release_id: u64, name: &str, dest: &Path) -> Result<()> {
        let bytes = self
            .release_with(release_id)
            .and_then(|_| self.contents.lock().unwrap().get(name).cloned())
            .ok_or_else(|| PublishError::AssetDownloadFailed {
                asset: name.to_string(),
                reason: "404 Not Found".to_string(),
            })?;
        tokio::fs::write(dest, bytes).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// notifier

#[derive(Debug, Default)]
pub struct FakeNotifier {
    pub fail: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl DeploymentNotifier for FakeNotifier {
    async fn notify(&self, tag: &ReleaseTag) -> Result<()> {
        self.calls.lock().unwrap().push(tag.to_string());
        if self.fail {
            return Err(NotificationError::Rejected {
                status: 503,
                body: "deploy queue unavailable".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// prompts

/// Answers questions from scripts; running out of answers is an error
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    confirms: Mutex<VecDeque<bool>>,
    choices: Mutex<VecDeque<usize>>,
    inputs: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<String>>,
    offered: Mutex<Vec<Vec<String>>>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn confirming(self, answers: &[bool]) -> Self {
        self.confirms.lock().unwrap().extend(answers.iter().copied());
        self
    }

    pub fn choosing(self, index: usize) -> Self {
        self.choices.lock().unwrap().push_back(index);
        self
    }

    pub fn typing(self, text: &str) -> Self {
        self.inputs.lock().unwrap().push_back(text.to_string());
        self
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }

    /// Choice lists shown so far
    pub fn offered(&self) -> Vec<Vec<String>> {
        self.offered.lock().unwrap().clone()
    }

    fn exhausted(message: &str) -> ReleaseError {
        CliError::PromptFailed {
            reason: format!("no scripted answer for '{}'", message),
        }
        .into()
    }
}

impl Prompter for ScriptedPrompter {
    async fn confirm(&self, message: &str) -> Result<bool> {
        self.asked.lock().unwrap().push(message.to_string());
        self.confirms
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Self::exhausted(message))
    }

    async fn choose(&self, message: &str, choices: &[String]) -> Result<usize> {
        self.asked.lock().unwrap().push(message.to_string());
        self.offered.lock().unwrap().push(choices.to_vec());
        self.choices
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Self::exhausted(message))
    }

    async fn input(&self, message: &str) -> Result<String> {
        self.asked.lock().unwrap().push(message.to_string());
        self.inputs
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Self::exhausted(message))
    }
}

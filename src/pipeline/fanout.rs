//! Concurrent build-and-upload over the platform matrix.
//!
//! Every platform becomes one task in a [`JoinSet`]. A task builds under the
//! build throttle, gives the build permit back as soon as the builder returns,
//! then hashes and uploads under the upload throttle. The local archive is
//! deleted once its upload attempt is over. A failing or panicking unit is
//! reported for its platform and never disturbs the others. Units are handed
//! to the coordinator as they finish, so progress can be recorded before the
//! whole matrix is done.

use crate::build::{BuildArtifact, BuildEnvironment};
use crate::cli::RuntimeConfig;
use crate::error::{PlatformError, ReleaseError};
use crate::github::ReleaseHost;
use crate::platform::Platform;
use crate::throttle::Throttle;
use crate::version::ReleaseTag;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Outcome of one platform unit
pub type UnitResult = std::result::Result<BuildArtifact, PlatformError>;

/// Everything a unit needs, shared read-only between units
pub(crate) struct UnitContext<E, H> {
    pub(crate) environment: Arc<E>,
    pub(crate) host: Arc<H>,
    pub(crate) release_id: u64,
    pub(crate) tag: ReleaseTag,
    pub(crate) product: String,
    pub(crate) workdir: PathBuf,
    pub(crate) builds: Throttle,
    pub(crate) uploads: Throttle,
    pub(crate) runtime: RuntimeConfig,
}

/// Results of a completed fan-out
#[derive(Debug, Default)]
pub struct FanOutReport {
    /// Units spawned, one per platform
    pub spawned: usize,
    /// Artifacts that were built and uploaded
    pub uploaded: Vec<BuildArtifact>,
    /// Units that failed
    pub failed: Vec<PlatformError>,
}

/// Platform units in flight
pub(crate) struct FanOut {
    units: JoinSet<UnitResult>,
    report: FanOutReport,
}

impl FanOut {
    /// Spawn one unit per platform
    pub(crate) fn start<E, H>(context: Arc<UnitContext<E, H>>, platforms: Vec<Platform>) -> Self
    where
        E: BuildEnvironment,
        H: ReleaseHost,
    {
        let mut units = JoinSet::new();
        for platform in platforms {
            let context = Arc::clone(&context);
            units.spawn(async move {
                // Run the unit in its own task so a panic is attributed to its platform
                let worker = tokio::spawn(run_unit(Arc::clone(&context), platform.clone()));
                match worker.await {
                    Ok(result) => result,
                    Err(e) => Err(PlatformError::UnitAborted {
                        platform,
                        reason: e.to_string(),
                    }),
                }
            });
        }

        let report = FanOutReport {
            spawned: units.len(),
            ..FanOutReport::default()
        };
        Self { units, report }
    }

    /// Wait for the next unit to finish; `None` once every unit has
    pub(crate) async fn next_finished(&mut self) -> Option<UnitResult> {
        loop {
            match self.units.join_next().await? {
                Ok(result) => {
                    match &result {
                        Ok(artifact) => self.report.uploaded.push(artifact.clone()),
                        Err(e) => self.report.failed.push(e.clone()),
                    }
                    return Some(result);
                }
                // The wrapper only awaits the worker, it cannot panic on its own
                Err(e) => log::error!("platform unit wrapper failed: {}", e),
            }
        }
    }

    /// Report of the finished units, ordered by platform
    pub(crate) fn into_report(self) -> FanOutReport {
        let mut report = self.report;
        report.uploaded.sort_by(|a, b| a.platform.cmp(&b.platform));
        report.failed.sort_by(|a, b| a.platform().cmp(b.platform()));
        report
    }
}

async fn run_unit<E, H>(context: Arc<UnitContext<E, H>>, platform: Platform) -> UnitResult
where
    E: BuildEnvironment,
    H: ReleaseHost,
{
    let name = platform.artifact_name(&context.product, context.tag.as_str());
    let path = context.workdir.join(&name);

    let permit = context
        .builds
        .acquire()
        .await
        .map_err(|e| aborted(&platform, e))?;
    context
        .runtime
        .progress_println(&format!("Building {}...", platform));
    let built = context.environment.build(&platform, &context.tag, &path).await;
    permit.release();

    if let Err(e) = built {
        log::error!("building {}: {}", platform, e);
        log::error!(">>>>>>>>>>>>\n{}\n<<<<<<<<<<<<", context.environment.log());
        context
            .runtime
            .warning_println(&format!("Build failed for {}: {}", platform, e));
        remove_artifact(&path).await;
        return Err(match e {
            ReleaseError::Platform(platform_error) => platform_error,
            other => PlatformError::BuildFailed {
                platform,
                reason: other.to_string(),
            },
        });
    }

    let result = upload(&context, &platform, name, &path).await;
    remove_artifact(&path).await;
    result
}

async fn upload<E, H>(
    context: &UnitContext<E, H>,
    platform: &Platform,
    name: String,
    path: &Path,
) -> UnitResult
where
    E: BuildEnvironment,
    H: ReleaseHost,
{
    let artifact = BuildArtifact::from_file(platform.clone(), name, path.to_path_buf())
        .await
        .map_err(|e| PlatformError::UploadFailed {
            platform: platform.clone(),
            reason: format!("hashing {}: {}", path.display(), e),
        })?;

    let permit = context
        .uploads
        .acquire()
        .await
        .map_err(|e| aborted(platform, e))?;
    context
        .runtime
        .progress_println(&format!("Uploading {}...", platform));
    let uploaded = context
        .host
        .upload_asset(context.release_id, &artifact.name, &artifact.path)
        .await;
    permit.release();

    match uploaded {
        Ok(asset) => {
            log::info!("uploaded {} ({} bytes)", asset.name, asset.size);
            context
                .runtime
                .success_println(&format!("Uploaded {} successfully", platform));
            Ok(artifact)
        }
        Err(e) => {
            log::error!("uploading {}: {}", platform, e);
            context
                .runtime
                .warning_println(&format!("Upload failed for {}: {}", platform, e));
            Err(PlatformError::UploadFailed {
                platform: platform.clone(),
                reason: e.to_string(),
            })
        }
    }
}

fn aborted(platform: &Platform, e: ReleaseError) -> PlatformError {
    PlatformError::UnitAborted {
        platform: platform.clone(),
        reason: e.to_string(),
    }
}

async fn remove_artifact(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("removing {}: {}", path.display(), e),
    }
}

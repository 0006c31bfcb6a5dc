//! Build toolchain boundary.
//!
//! A [`BuildBackend`] opens a [`BuildEnvironment`] for one commit or tag. The
//! environment runs the project's check suite and cross-compiles archives for
//! individual platforms. The production backend drives an external builder
//! executable; tests substitute in-memory fakes.

mod command;

pub use command::{CommandBuilder, CommandEnvironment};

use crate::error::Result;
use crate::platform::Platform;
use crate::version::ReleaseTag;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

/// Extra package compiled into the build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plugin {
    /// Import path or package name
    pub package: String,
}

/// Result of running the check suite
#[derive(Debug, Clone)]
pub struct CheckReport {
    /// Whether every check passed
    pub passed: bool,
    /// Combined output of the check run
    pub log: String,
}

/// Opens build environments
pub trait BuildBackend: Send + Sync {
    /// Environment type produced by this backend
    type Environment: BuildEnvironment;

    /// Prepare an environment for `reference` with the given plugins
    fn open(
        &self,
        reference: &str,
        plugins: &[Plugin],
    ) -> impl Future<Output = Result<Self::Environment>> + Send;
}

/// A prepared source tree that can be checked and built.
///
/// One environment is shared by every platform unit of a release, so all
/// methods take `&self`.
pub trait BuildEnvironment: Send + Sync + 'static {
    /// Run the check suite
    fn run_checks(&self) -> impl Future<Output = Result<CheckReport>> + Send;

    /// Build the archive for `platform` at `output`.
    ///
    /// Success means the archive exists at `output`. Failures are reported as
    /// `PlatformError::BuildFailed`.
    fn build(
        &self,
        platform: &Platform,
        tag: &ReleaseTag,
        output: &Path,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Everything the environment has logged so far
    fn log(&self) -> String;
}

/// One built archive waiting to be uploaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArtifact {
    /// Target platform
    pub platform: Platform,
    /// Local archive path
    pub path: PathBuf,
    /// Asset name on the release host
    pub name: String,
    /// Hex-encoded SHA-256 of the archive
    pub sha256: String,
}

impl BuildArtifact {
    /// Hash the archive at `path` and describe it
    pub async fn from_file(platform: Platform, name: String, path: PathBuf) -> Result<Self> {
        let sha256 = sha256_file(&path).await?;
        Ok(Self {
            platform,
            path,
            name,
            sha256,
        })
    }
}

/// Hex-encoded SHA-256 of a file, streamed in 8 KiB chunks
pub async fn sha256_file(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

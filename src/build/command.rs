//! Build backend that shells out to an external builder executable.
//!
//! The builder is invoked as
//!
//! ```text
//! <builder> check --repo-path P --ref R [--plugin PKG]...
//! <builder> build --repo-path P --ref R --os O --arch A [--arm N] [--plugin PKG]... --output FILE
//! ```
//!
//! Exit status 0 means success; for `build` the archive must then exist at
//! `FILE`.

use super::{BuildBackend, BuildEnvironment, CheckReport, Plugin};
use crate::error::{PlatformError, Result, VerificationError};
use crate::platform::Platform;
use crate::version::ReleaseTag;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use tokio::process::Command;

/// Output lines kept in a build failure reason
const FAILURE_TAIL_LINES: usize = 20;

/// Backend running `<builder>` from `PATH` against a local repository
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    program: String,
    repo_path: PathBuf,
}

impl CommandBuilder {
    /// Create a backend for `repo_path` using the `program` executable
    pub fn new<P: AsRef<Path>>(program: impl Into<String>, repo_path: P) -> Self {
        Self {
            program: program.into(),
            repo_path: repo_path.as_ref().to_path_buf(),
        }
    }
}

impl BuildBackend for CommandBuilder {
    type Environment = CommandEnvironment;

    async fn open(&self, reference: &str, plugins: &[Plugin]) -> Result<CommandEnvironment> {
        let program = which::which(&self.program).map_err(|e| {
            VerificationError::EnvironmentUnavailable {
                reference: reference.to_string(),
                reason: format!("{}: {}", self.program, e),
            }
        })?;

        if !self.repo_path.is_dir() {
            return Err(VerificationError::EnvironmentUnavailable {
                reference: reference.to_string(),
                reason: format!("{} is not a directory", self.repo_path.display()),
            }
            .into());
        }

        log::debug!(
            "build environment for {} using {} ({} plugin(s))",
            reference,
            program.display(),
            plugins.len()
        );

        Ok(CommandEnvironment {
            program,
            repo_path: self.repo_path.clone(),
            reference: reference.to_string(),
            plugins: plugins.to_vec(),
            log: Mutex::new(String::new()),
        })
    }
}

/// Environment bound to one reference of the repository
#[derive(Debug)]
pub struct CommandEnvironment {
    program: PathBuf,
    repo_path: PathBuf,
    reference: String,
    plugins: Vec<Plugin>,
    log: Mutex<String>,
}

/// Captured result of one builder invocation
struct Invocation {
    success: bool,
    status: String,
    output: String,
}

impl CommandEnvironment {
    /// Reference this environment was opened at
    pub fn reference(&self) -> &str {
        &self.reference
    }

    fn base_args(&self, subcommand: &str) -> Vec<String> {
        let mut args = vec![
            subcommand.to_string(),
            "--repo-path".to_string(),
            self.repo_path.display().to_string(),
            "--ref".to_string(),
            self.reference.clone(),
        ];
        for plugin in &self.plugins {
            args.push("--plugin".to_string());
            args.push(plugin.package.clone());
        }
        args
    }

    async fn invoke(&self, heading: &str, args: &[String]) -> std::io::Result<Invocation> {
        log::debug!("{} {}", self.program.display(), args.join(" "));
        let output = Command::new(&self.program)
            .args(args)
            .current_dir(&self.repo_path)
            .stdin(Stdio::null())
            .output()
            .await?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        self.append_log(heading, &text);

        Ok(Invocation {
            success: output.status.success(),
            status: output.status.to_string(),
            output: text,
        })
    }

    fn append_log(&self, heading: &str, text: &str) {
        let mut log = self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        log.push_str(&format!("==> {}\n", heading));
        log.push_str(text);
        if !text.ends_with('\n') {
            log.push('\n');
        }
    }
}

/// Last few lines of builder output
fn tail(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(FAILURE_TAIL_LINES);
    lines[start..].join("\n")
}

impl BuildEnvironment for CommandEnvironment {
    async fn run_checks(&self) -> Result<CheckReport> {
        let args = self.base_args("check");
        let invocation = self
            .invoke("check", &args)
            .await
            .map_err(|e| VerificationError::EnvironmentUnavailable {
                reference: self.reference.clone(),
                reason: e.to_string(),
            })?;

        Ok(CheckReport {
            passed: invocation.success,
            log: invocation.output,
        })
    }

    async fn build(&self, platform: &Platform, tag: &ReleaseTag, output: &Path) -> Result<()> {
        let mut args = self.base_args("build");
        args.extend([
            "--os".to_string(),
            platform.os.clone(),
            "--arch".to_string(),
            platform.arch.clone(),
        ]);
        if !platform.arm.is_empty() {
            args.extend(["--arm".to_string(), platform.arm.clone()]);
        }
        args.extend(["--output".to_string(), output.display().to_string()]);

        let heading = format!("build {} {}", tag, platform);
        let invocation = self.invoke(&heading, &args).await.map_err(|e| {
            PlatformError::BuildFailed {
                platform: platform.clone(),
                reason: e.to_string(),
            }
        })?;

        if !invocation.success {
            return Err(PlatformError::BuildFailed {
                platform: platform.clone(),
                reason: format!("builder exited with {}\n{}", invocation.status, tail(&invocation.output)),
            }
            .into());
        }

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(PlatformError::BuildFailed {
                platform: platform.clone(),
                reason: format!("builder succeeded but {} was not created", output.display()),
            }
            .into());
        }

        Ok(())
    }

    fn log(&self) -> String {
        self.log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

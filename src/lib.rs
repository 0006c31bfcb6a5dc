//! # release_deploy
//!
//! Interactive release pipeline for projects shipped as prebuilt archives on
//! many platforms.
//!
//! A run checks the repository, asks the release manager for the new tag,
//! runs the check suite, signs and pushes the tag, creates the hosted
//! release and then builds and uploads every platform concurrently. Final
//! releases are announced to a deployment service at the end.
//!
//! ## Features
//!
//! - **Preflight**: configuration, tools, clean working copy and explicit confirmations
//! - **Tag Planning**: next-tag suggestions from the highest existing tag
//! - **Bounded Fan-Out**: independent throttles for builds and uploads
//! - **Partial Failure**: a failing platform never stops the others
//! - **Resume Capability**: `--resume publish` continues after the tag was pushed
//!
//! ## Usage
//!
//! ```bash
//! release_deploy                   # start a new release
//! release_deploy --resume publish  # continue an interrupted release
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Core modules
pub mod build;
pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod github;
pub mod notify;
pub mod pipeline;
pub mod platform;
pub mod preflight;
pub mod prompt;
pub mod state;
pub mod throttle;
pub mod version;

// Re-export main types for public API
pub use build::{BuildArtifact, BuildBackend, BuildEnvironment, CommandBuilder};
pub use cli::{Args, RuntimeConfig};
pub use config::EnvConfig;
pub use error::{ReleaseError, Result};
pub use git::{GitOperations, SystemGitOperations};
pub use github::{GitHubReleaseHost, ReleaseHost};
pub use notify::{DeploymentNotifier, HttpDeploymentNotifier};
pub use pipeline::{PipelineState, ReleaseOutcome, ReleasePipeline, RunPlan};
pub use platform::{Platform, PlatformMatrix};
pub use preflight::PreflightChecker;
pub use prompt::{Prompter, TerminalPrompter};
pub use state::{ReleaseState, StateManager};
pub use throttle::Throttle;
pub use version::{ReleaseTag, TagPlanner};

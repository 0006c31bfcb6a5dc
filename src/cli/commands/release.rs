//! Release command execution.
//!
//! Wires the production collaborators together: preflight against the
//! configured repository, choose or recover the tag, then hand over to the
//! pipeline.

use super::helpers::{GITHUB_REMOTE, resolve_github_repo};
use crate::build::CommandBuilder;
use crate::cli::{Args, RuntimeConfig};
use crate::config::EnvConfig;
use crate::error::Result;
use crate::git::{GitOperations, SystemGitOperations};
use crate::github::GitHubReleaseHost;
use crate::notify::HttpDeploymentNotifier;
use crate::pipeline::{
    PipelineSettings, ReleaseOutcome, ReleasePipeline, ResumeController, ResumeToken, RunPlan,
};
use crate::preflight::{self, PreflightChecker};
use crate::prompt::{Prompter, TerminalPrompter};
use crate::state::StateManager;
use crate::version::TagPlanner;

/// Execute a new or resumed release
pub(super) async fn execute_release(args: &Args, runtime: &RuntimeConfig) -> Result<i32> {
    let token = ResumeToken::parse(&args.resume)?;

    let config = EnvConfig::from_env()?;
    preflight::check_environment(&config)?;
    preflight::check_tools(&config)?;
    runtime.println(&format!("Using source at: {}", config.repo_path.display()));

    let git = SystemGitOperations::new(&config.repo_path);
    let prompter = TerminalPrompter::new();

    let checker = PreflightChecker::new(&git, &prompter, runtime);
    checker.check_clean_tree().await?;

    let plan = match token {
        Some(token) => {
            ResumeController::new(&git, &prompter, runtime)
                .resolve(token)
                .await?
        }
        None => plan_new_release(&checker, &git, &prompter, runtime).await?,
    };

    let remote_url = match config.github_repo {
        Some(_) => None,
        None => git.remote_url(GITHUB_REMOTE).await?,
    };
    let repo = resolve_github_repo(config.github_repo.as_ref(), remote_url.as_deref())?;
    runtime.verbose_println(&format!("Publishing to {}", repo));

    let host = GitHubReleaseHost::new(
        config.github_api_url.clone(),
        config.github_uploads_url.clone(),
        repo,
        config.github_token.clone(),
    )?;
    let notifier = HttpDeploymentNotifier::new(
        config.deploy_endpoint(),
        config.product.clone(),
        config.devportal_id.clone(),
        config.devportal_key.clone(),
    );
    let backend = CommandBuilder::new(config.builder.clone(), &config.repo_path);
    let settings = PipelineSettings::from_config(&config)?;
    let state = StateManager::for_repository(&config.state_dir, &config.repo_path);
    runtime.verbose_println(&format!("Run state: {}", state.path().display()));

    let tag = plan.tag.clone();
    let mut pipeline = ReleasePipeline::new(git, backend, host, notifier, settings, runtime.clone())
        .with_state_manager(state);

    match pipeline.run(plan).await {
        Ok(outcome) => {
            report_outcome(&outcome, runtime);
            runtime.success_println(&format!("{} release successful.", tag));
            Ok(0)
        }
        Err(e) => {
            // The operator may have stepped away while platforms were building
            if pipeline.fan_out_started() {
                runtime.bell();
            }
            // Errors implying a pushed tag carry their own resume advice
            if pipeline.tag_pushed() && !e.may_have_side_effects() {
                runtime.warning_println(&format!(
                    "{} is already pushed; fix the problem below and continue with --resume publish",
                    tag
                ));
            }
            Err(e)
        }
    }
}

/// Confirmations and tag selection for a new release
async fn plan_new_release<G: GitOperations, P: Prompter>(
    checker: &PreflightChecker<'_, G, P>,
    git: &G,
    prompter: &P,
    runtime: &RuntimeConfig,
) -> Result<RunPlan> {
    checker.confirm_commit().await?;
    checker.confirm_changelog().await?;

    let tag = TagPlanner::new(git).choose_next(prompter).await?;
    if tag.is_prerelease() {
        runtime.println(&format!("{} will be published as a pre-release", tag));
    }

    runtime.println("");
    runtime.println("NOTICE: If you continue, checks run on the current commit and the");
    runtime.println("release continues only if they pass. The tag is then signed and pushed.");
    checker.confirm_ready().await?;

    Ok(RunPlan::new_release(tag))
}

fn report_outcome(outcome: &ReleaseOutcome, runtime: &RuntimeConfig) {
    runtime.println(&format!("Release page: {}", outcome.release.html_url));
    runtime.println(&format!(
        "{} asset(s) uploaded, {} skipped",
        outcome.uploaded.len(),
        outcome.skipped.len()
    ));
    if !outcome.failed.is_empty() {
        runtime.warning_println(&format!(
            "{} platform(s) failed and are missing from the release:",
            outcome.failed.len()
        ));
        for failure in &outcome.failed {
            runtime.indent(&failure.platform().to_string());
        }
        runtime.indent("Re-run with --resume publish to retry them");
    }
    if outcome.notified {
        runtime.println("Deployment service notified");
    }
}

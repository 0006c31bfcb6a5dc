//! End-to-end pipeline runs against in-memory collaborators.

mod common;

use common::*;
use release_deploy::error::{PlatformError, PublishError, ReleaseError, VerificationError};
use release_deploy::github::HostedRelease;
use release_deploy::pipeline::{
    CHECKSUMS_ASSET, PipelineState, ResumeController, ResumeToken, RunPlan,
};
use release_deploy::platform::{Platform, PlatformMatrix, PlatformPattern};
use release_deploy::state::{ReleaseState, StateManager};
use release_deploy::version::TagPlanner;
use release_deploy::RuntimeConfig;

fn pipeline_with_state(
    git: FakeGit,
    backend: FakeBackend,
    host: FakeHost,
    notifier: FakeNotifier,
    state_file: &std::path::Path,
) -> TestPipeline {
    pipeline(git, backend, host, notifier, settings(six_platforms()))
        .with_state_manager(StateManager::new(state_file))
}

fn expected_assets(tag: &str, platforms: &[Platform]) -> Vec<String> {
    let mut names: Vec<String> = platforms.iter().map(|p| asset_name(p, tag)).collect();
    names.push(CHECKSUMS_ASSET.to_string());
    names.sort();
    names
}

#[tokio::test]
async fn new_release_tags_pushes_uploads_and_notifies() {
    let git = FakeGit::with_tags(&["v1.5.0", "v1.5.2", "v1.5.1"]);
    let prompter = ScriptedPrompter::new().choosing(0);
    let chosen = TagPlanner::new(&git).choose_next(&prompter).await.unwrap();
    assert_eq!(chosen.as_str(), "v1.5.3");
    assert_eq!(prompter.offered()[0][0], "v1.5.3");

    let backend = FakeBackend::new();
    let stats = backend.stats.clone();
    let mut pipeline = pipeline(
        git,
        backend,
        FakeHost::new(),
        FakeNotifier::new(),
        settings(six_platforms()),
    );

    let outcome = pipeline.run(RunPlan::new_release(chosen)).await.unwrap();

    assert_eq!(
        pipeline.git().mutations(),
        vec!["tag v1.5.3", "push", "push --tags"]
    );
    let created = pipeline.host().created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].tag.as_str(), "v1.5.3");
    assert_eq!(created[0].name, "1.5.3");
    assert!(!created[0].prerelease);

    assert_eq!(
        pipeline.host().uploaded_names(),
        expected_assets("v1.5.3", &six_platforms())
    );
    assert_eq!(pipeline.notifier().calls(), vec!["v1.5.3"]);

    assert_eq!(outcome.spawned_units, 6);
    assert_eq!(outcome.uploaded.len(), 6);
    assert!(outcome.failed.is_empty());
    assert!(outcome.skipped.is_empty());
    assert!(outcome.checksums_uploaded);
    assert!(outcome.notified);

    // Checks run on the commit, builds on the tag
    let opened = stats.opened.lock().unwrap().clone();
    assert_eq!(opened.len(), 2);
    assert_eq!(opened[0], "4f1c2e9d0b7a6c5e4f3a2b1c0d9e8f7a6b5c4d3e");
    assert_eq!(opened[1], "v1.5.3");

    assert_eq!(pipeline.state(), PipelineState::Done);
    assert_eq!(
        pipeline.history(),
        &[
            PipelineState::Checked,
            PipelineState::Verified,
            PipelineState::Tagged,
            PipelineState::Pushed,
            PipelineState::Published,
            PipelineState::Building,
            PipelineState::Fanned,
            PipelineState::Notified,
            PipelineState::Done,
        ]
    );
}

#[tokio::test]
async fn prerelease_is_flagged_and_never_notified() {
    let mut pipeline = pipeline(
        FakeGit::with_tags(&["v1.9.0"]),
        FakeBackend::new(),
        FakeHost::new(),
        FakeNotifier::new(),
        settings(six_platforms()),
    );

    let outcome = pipeline
        .run(RunPlan::new_release(tag("v2.0.0-rc1")))
        .await
        .unwrap();

    assert!(pipeline.host().created()[0].prerelease);
    assert_eq!(outcome.uploaded.len(), 6);
    assert!(outcome.failed.is_empty());
    assert!(!outcome.notified);
    assert!(pipeline.notifier().calls().is_empty());
    assert!(!pipeline.history().contains(&PipelineState::Notified));
    assert_eq!(pipeline.state(), PipelineState::Done);
}

#[tokio::test]
async fn failing_platform_does_not_stop_the_others() {
    let broken = Platform::new("linux", "386", "");
    let mut pipeline = pipeline(
        FakeGit::with_tags(&["v1.5.2"]),
        FakeBackend::new().failing_on(broken.clone()),
        FakeHost::new(),
        FakeNotifier::new(),
        settings(six_platforms()),
    );

    let outcome = pipeline.run(RunPlan::new_release(tag("v1.5.3"))).await.unwrap();

    assert_eq!(outcome.spawned_units, 6);
    assert_eq!(outcome.uploaded.len(), 5);
    assert_eq!(outcome.failed.len(), 1);
    assert!(matches!(
        &outcome.failed[0],
        PlatformError::BuildFailed { platform, .. } if *platform == broken
    ));
    assert!(outcome.failed[0].to_string().contains("linux/386"));

    let healthy: Vec<Platform> = six_platforms().into_iter().filter(|p| *p != broken).collect();
    assert_eq!(
        pipeline.host().uploaded_names(),
        expected_assets("v1.5.3", &healthy)
    );
    assert!(outcome.notified);
    assert_eq!(pipeline.state(), PipelineState::Done);
}

#[tokio::test]
async fn failing_upload_is_reported_for_its_platform() {
    let windows = Platform::new("windows", "amd64", "");
    let mut pipeline = pipeline(
        FakeGit::with_tags(&["v1.5.2"]),
        FakeBackend::new(),
        FakeHost::new().failing_upload(&asset_name(&windows, "v1.5.3")),
        FakeNotifier::new(),
        settings(six_platforms()),
    );

    let outcome = pipeline.run(RunPlan::new_release(tag("v1.5.3"))).await.unwrap();

    assert_eq!(outcome.uploaded.len(), 5);
    assert!(matches!(
        &outcome.failed[..],
        [PlatformError::UploadFailed { platform, .. }] if *platform == windows
    ));
}

#[tokio::test]
async fn panicking_unit_is_attributed_to_its_platform() {
    let darwin = Platform::new("darwin", "amd64", "");
    let mut pipeline = pipeline(
        FakeGit::with_tags(&["v1.5.2"]),
        FakeBackend::new().panicking_on(darwin.clone()),
        FakeHost::new(),
        FakeNotifier::new(),
        settings(six_platforms()),
    );

    let outcome = pipeline.run(RunPlan::new_release(tag("v1.5.3"))).await.unwrap();

    assert_eq!(outcome.uploaded.len(), 5);
    assert!(matches!(
        &outcome.failed[..],
        [PlatformError::UnitAborted { platform, .. }] if *platform == darwin
    ));
    assert_eq!(pipeline.state(), PipelineState::Done);
}

#[tokio::test]
async fn one_unit_per_platform_left_after_exclusions() {
    let matrix = PlatformMatrix::from_platforms(six_platforms())
        .exclude([PlatformPattern::os("linux"), PlatformPattern::os("freebsd")]);
    let total = matrix.total();
    let platforms = matrix.platforms();
    assert_eq!(total, 6);
    assert_eq!(platforms.len(), 2);

    let backend = FakeBackend::new();
    let stats = backend.stats.clone();
    let mut pipeline = pipeline(
        FakeGit::with_tags(&["v1.5.2"]),
        backend,
        FakeHost::new(),
        FakeNotifier::new(),
        settings(platforms),
    );

    let outcome = pipeline.run(RunPlan::new_release(tag("v1.5.3"))).await.unwrap();

    assert_eq!(outcome.spawned_units, total - 4);
    assert_eq!(stats.builds(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn throttles_bound_in_flight_work_under_random_timing() {
    let platforms: Vec<Platform> = PlatformMatrix::supported().platforms().into_iter().take(16).collect();

    for (builds, uploads) in [(1, 1), (2, 3), (3, 2), (4, 4)] {
        let backend = FakeBackend::new().with_random_pauses(6);
        let stats = backend.stats.clone();
        let mut settings = settings(platforms.clone());
        settings.build_concurrency = builds;
        settings.upload_concurrency = uploads;

        let mut pipeline = pipeline(
            FakeGit::with_tags(&["v1.5.2"]),
            backend,
            FakeHost::new().with_random_pauses(6),
            FakeNotifier::new(),
            settings,
        );

        let outcome = pipeline.run(RunPlan::new_release(tag("v1.5.3"))).await.unwrap();

        assert_eq!(outcome.uploaded.len(), platforms.len());
        assert!(
            stats.max_in_flight() <= builds,
            "{} builds in flight with capacity {}",
            stats.max_in_flight(),
            builds
        );
        assert!(
            pipeline.host().max_in_flight() <= uploads,
            "{} uploads in flight with capacity {}",
            pipeline.host().max_in_flight(),
            uploads
        );
    }
}

#[tokio::test]
async fn checksums_cover_every_uploaded_archive() {
    let mut pipeline = pipeline(
        FakeGit::with_tags(&["v1.5.2"]),
        FakeBackend::new().failing_on(Platform::new("linux", "arm", "7")),
        FakeHost::new(),
        FakeNotifier::new(),
        settings(six_platforms()),
    );

    pipeline.run(RunPlan::new_release(tag("v1.5.3"))).await.unwrap();

    let sums = pipeline.host().checksums().unwrap();
    let lines: Vec<&str> = sums.lines().collect();
    assert_eq!(lines.len(), 5);

    let names: Vec<&str> = lines
        .iter()
        .map(|line| {
            let (hash, name) = line.split_once("  ").unwrap();
            assert_eq!(hash.len(), 64);
            assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
            name
        })
        .collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
    assert!(!names.iter().any(|n| n.contains("linux_arm7")));
}

#[tokio::test]
async fn local_archives_are_removed_after_upload() {
    let mut pipeline = pipeline(
        FakeGit::with_tags(&["v1.5.2"]),
        FakeBackend::new(),
        FakeHost::new(),
        FakeNotifier::new(),
        settings(six_platforms()),
    );

    pipeline.run(RunPlan::new_release(tag("v1.5.3"))).await.unwrap();

    let paths = pipeline.host().uploaded_paths();
    assert_eq!(paths.len(), 7);
    for path in paths {
        assert!(!path.exists(), "{} was left behind", path.display());
    }
}

#[tokio::test]
async fn failed_checks_stop_before_tagging() {
    let backend = FakeBackend::new().failing_checks();
    let stats = backend.stats.clone();
    let mut pipeline = pipeline(
        FakeGit::with_tags(&["v1.5.2"]),
        backend,
        FakeHost::new(),
        FakeNotifier::new(),
        settings(six_platforms()),
    );

    let err = pipeline
        .run(RunPlan::new_release(tag("v1.5.3")))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ReleaseError::Verification(VerificationError::ChecksFailed { .. })
    ));
    assert!(pipeline.git().mutations().is_empty());
    assert!(pipeline.host().created().is_empty());
    assert_eq!(stats.builds(), 0);
    assert_eq!(pipeline.state(), PipelineState::Aborted);
    assert!(!pipeline.fan_out_started());
}

#[tokio::test]
async fn unreachable_host_stops_before_tagging() {
    let mut host = FakeHost::new();
    host.fail_verify = true;
    let mut pipeline = pipeline(
        FakeGit::with_tags(&["v1.5.2"]),
        FakeBackend::new(),
        host,
        FakeNotifier::new(),
        settings(six_platforms()),
    );

    let err = pipeline
        .run(RunPlan::new_release(tag("v1.5.3")))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ReleaseError::Publish(PublishError::HostUnavailable { .. })
    ));
    assert!(pipeline.git().mutations().is_empty());
}

#[tokio::test]
async fn failed_push_is_recorded_for_resume() {
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("caddy.json");

    let mut pipeline = pipeline(
        FakeGit::with_tags(&["v1.5.2"]).failing_push(),
        FakeBackend::new(),
        FakeHost::new(),
        FakeNotifier::new(),
        settings(six_platforms()),
    )
    .with_state_manager(StateManager::new(&state_file));

    let err = pipeline
        .run(RunPlan::new_release(tag("v1.5.3")))
        .await
        .unwrap_err();

    assert!(matches!(err, ReleaseError::Publish(PublishError::PushFailed { .. })));
    assert_eq!(pipeline.git().mutations(), vec!["tag v1.5.3", "push"]);
    assert!(pipeline.host().created().is_empty());

    let loaded = StateManager::new(&state_file).load_state().await.unwrap();
    assert_eq!(loaded.state.tag.as_str(), "v1.5.3");
    assert_eq!(loaded.state.phase, PipelineState::Aborted);
    assert!(loaded.state.has_completed(PipelineState::Tagged));
    assert!(!loaded.state.has_completed(PipelineState::Pushed));
    assert_eq!(loaded.state.errors.len(), 1);
    assert!(!pipeline.tag_pushed());

    // The tag exists locally, so resuming finds it and pushes first
    let mut resumed = pipeline_with_state(
        FakeGit::with_tags(&["v1.5.2", "v1.5.3"]),
        FakeBackend::new(),
        FakeHost::new(),
        FakeNotifier::new(),
        &state_file,
    );
    let outcome = resumed
        .run(RunPlan::resume(tag("v1.5.3"), ResumeToken::Publish))
        .await
        .unwrap();

    assert_eq!(resumed.git().mutations(), vec!["push", "push --tags"]);
    assert_eq!(
        resumed.history()[..2],
        [PipelineState::Pushed, PipelineState::Published]
    );
    assert_eq!(resumed.host().created().len(), 1);
    assert!(outcome.notified);
}

#[tokio::test]
async fn resume_after_failed_release_creation_skips_tag_and_push() {
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("caddy.json");

    let mut first = pipeline(
        FakeGit::with_tags(&["v1.5.2"]),
        FakeBackend::new(),
        FakeHost::new().failing_create(),
        FakeNotifier::new(),
        settings(six_platforms()),
    )
    .with_state_manager(StateManager::new(&state_file));

    let err = first
        .run(RunPlan::new_release(tag("v1.5.3")))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ReleaseError::Publish(PublishError::ReleaseCreationFailed { .. })
    ));
    assert!(err.may_have_side_effects());
    assert_eq!(first.git().mutations(), vec!["tag v1.5.3", "push", "push --tags"]);
    assert!(!first.fan_out_started());

    // The pushed tag is now the most recent one
    let git = FakeGit::with_tags(&["v1.5.2", "v1.5.3"]);
    let prompter = ScriptedPrompter::new().confirming(&[true]);
    let runtime = RuntimeConfig::quiet();
    let plan = ResumeController::new(&git, &prompter, &runtime)
        .resolve(ResumeToken::Publish)
        .await
        .unwrap();
    assert_eq!(plan.tag.as_str(), "v1.5.3");
    assert!(plan.is_resume());

    let backend = FakeBackend::new();
    let stats = backend.stats.clone();
    let mut second = pipeline(
        git,
        backend,
        FakeHost::new(),
        FakeNotifier::new(),
        settings(six_platforms()),
    )
    .with_state_manager(StateManager::new(&state_file));

    let outcome = second.run(plan).await.unwrap();

    assert!(second.git().mutations().is_empty());
    assert_eq!(*stats.opened.lock().unwrap(), vec!["v1.5.3".to_string()]);
    assert_eq!(second.host().created().len(), 1);
    assert_eq!(
        second.host().uploaded_names(),
        expected_assets("v1.5.3", &six_platforms())
    );
    assert!(outcome.notified);
    assert_eq!(
        second.history().first(),
        Some(&PipelineState::Published)
    );
    assert!(!state_file.exists());
}

#[tokio::test]
async fn resume_after_failed_notification_only_notifies() {
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("caddy.json");

    let mut first = pipeline(
        FakeGit::with_tags(&["v1.5.2"]),
        FakeBackend::new(),
        FakeHost::new(),
        FakeNotifier::failing(),
        settings(six_platforms()),
    )
    .with_state_manager(StateManager::new(&state_file));

    let err = first
        .run(RunPlan::new_release(tag("v1.5.3")))
        .await
        .unwrap_err();
    assert!(matches!(err, ReleaseError::Notification(_)));
    assert!(first.fan_out_started());
    assert!(first.tag_pushed());
    assert_eq!(first.state(), PipelineState::Aborted);
    assert_eq!(first.host().created().len(), 1);

    let recorded = StateManager::new(&state_file).load_state().await.unwrap().state;
    assert!(recorded.hosted_release.is_some());
    assert_eq!(recorded.platform_assets().count(), 6);
    assert!(recorded.is_uploaded(CHECKSUMS_ASSET));

    let backend = FakeBackend::new();
    let stats = backend.stats.clone();
    let mut second = pipeline_with_state(
        FakeGit::with_tags(&["v1.5.2", "v1.5.3"]),
        backend,
        FakeHost::resumed_from(first.host()),
        FakeNotifier::new(),
        &state_file,
    );

    let outcome = second
        .run(RunPlan::resume(tag("v1.5.3"), ResumeToken::Publish))
        .await
        .unwrap();

    assert!(second.host().created().is_empty());
    assert!(second.host().uploaded_names().is_empty());
    assert!(second.host().deleted().is_empty());
    assert_eq!(stats.builds(), 0);
    assert_eq!(outcome.spawned_units, 0);
    assert_eq!(outcome.skipped.len(), 6);
    assert!(!outcome.checksums_uploaded);
    assert_eq!(Some(outcome.release.id), recorded.hosted_release.map(|r| r.id));
    assert_eq!(second.notifier().calls(), vec!["v1.5.3"]);
    assert!(!state_file.exists());
}

#[tokio::test]
async fn resume_without_record_reuses_existing_release() {
    let linux = Platform::new("linux", "amd64", "");
    let existing = HostedRelease {
        id: 7,
        html_url: "https://github.com/caddyserver/caddy/releases/tag/v1.5.3".to_string(),
        assets: vec![asset_name(&linux, "v1.5.3")],
    };

    let mut pipeline = pipeline(
        FakeGit::with_tags(&["v1.5.3"]),
        FakeBackend::new(),
        FakeHost::new().with_existing(existing),
        FakeNotifier::new(),
        settings(six_platforms()),
    );

    let outcome = pipeline
        .run(RunPlan::resume(tag("v1.5.3"), ResumeToken::Publish))
        .await
        .unwrap();

    assert!(pipeline.host().created().is_empty());
    assert_eq!(outcome.release.id, 7);
    assert_eq!(outcome.skipped, vec![linux.clone()]);
    assert_eq!(outcome.spawned_units, 5);

    let others: Vec<Platform> = six_platforms().into_iter().filter(|p| *p != linux).collect();
    assert_eq!(
        pipeline.host().uploaded_names(),
        expected_assets("v1.5.3", &others)
    );

    // The archive from the earlier run is hashed from the release itself
    let sums = pipeline.host().checksums().unwrap();
    assert_eq!(sums.lines().count(), 6);
    assert!(sums.contains(&asset_name(&linux, "v1.5.3")));
}

#[tokio::test]
async fn resume_ignores_record_of_another_tag() {
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("caddy.json");

    let mut stale = release_deploy::state::ReleaseState::new(tag("v1.4.0"));
    stale.set_hosted_release(HostedRelease {
        id: 3,
        html_url: "https://github.com/caddyserver/caddy/releases/tag/v1.4.0".to_string(),
        assets: Vec::new(),
    });
    StateManager::new(&state_file).save_state(&mut stale).await.unwrap();

    let mut pipeline = pipeline(
        FakeGit::with_tags(&["v1.5.3"]),
        FakeBackend::new(),
        FakeHost::new(),
        FakeNotifier::new(),
        settings(six_platforms()),
    )
    .with_state_manager(StateManager::new(&state_file));

    let outcome = pipeline
        .run(RunPlan::resume(tag("v1.5.3"), ResumeToken::Publish))
        .await
        .unwrap();

    assert_ne!(outcome.release.id, 3);
    assert_eq!(pipeline.host().created().len(), 1);
}

#[tokio::test]
async fn resume_trusts_the_host_over_a_stale_record() {
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("caddy.json");

    // Saved when the fan-out began, before any unit finished
    let mut record = ReleaseState::new(tag("v1.5.3"));
    record.set_hosted_release(HostedRelease {
        id: 7,
        html_url: "https://github.com/caddyserver/caddy/releases/tag/v1.5.3".to_string(),
        assets: Vec::new(),
    });
    record.add_checkpoint(PipelineState::Building, None);
    StateManager::new(&state_file).save_state(&mut record).await.unwrap();

    let on_host = HostedRelease {
        id: 7,
        html_url: "https://github.com/caddyserver/caddy/releases/tag/v1.5.3".to_string(),
        assets: six_platforms()
            .iter()
            .map(|p| asset_name(p, "v1.5.3"))
            .collect(),
    };
    let backend = FakeBackend::new();
    let stats = backend.stats.clone();
    let mut pipeline = pipeline_with_state(
        FakeGit::with_tags(&["v1.5.3"]),
        backend,
        FakeHost::new().with_existing(on_host),
        FakeNotifier::new(),
        &state_file,
    );

    let outcome = pipeline
        .run(RunPlan::resume(tag("v1.5.3"), ResumeToken::Publish))
        .await
        .unwrap();

    assert_eq!(outcome.spawned_units, 0);
    assert_eq!(outcome.skipped.len(), 6);
    assert_eq!(stats.builds(), 0);
    assert!(pipeline.host().created().is_empty());
    assert_eq!(pipeline.host().uploaded_names(), vec![CHECKSUMS_ASSET]);
    assert_eq!(pipeline.host().checksums().unwrap().lines().count(), 6);
    assert!(outcome.notified);
}

#[tokio::test]
async fn interrupted_fan_out_keeps_finished_units() {
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("caddy.json");
    let stuck = Platform::new("windows", "amd64", "");

    let mut first = pipeline_with_state(
        FakeGit::with_tags(&["v1.5.2"]),
        FakeBackend::new().hanging_on(stuck.clone()),
        FakeHost::new(),
        FakeNotifier::new(),
        &state_file,
    );

    // Dropping the run stands in for the operator pressing Ctrl-C
    let interrupted = tokio::time::timeout(
        std::time::Duration::from_secs(1),
        first.run(RunPlan::new_release(tag("v1.5.3"))),
    )
    .await;
    assert!(interrupted.is_err());

    let recorded = StateManager::new(&state_file).load_state().await.unwrap().state;
    assert_eq!(recorded.phase, PipelineState::Building);
    assert_eq!(recorded.platform_assets().count(), 5);
    assert!(!recorded.is_uploaded(&asset_name(&stuck, "v1.5.3")));

    let backend = FakeBackend::new();
    let stats = backend.stats.clone();
    let mut second = pipeline_with_state(
        FakeGit::with_tags(&["v1.5.2", "v1.5.3"]),
        backend,
        FakeHost::resumed_from(first.host()),
        FakeNotifier::new(),
        &state_file,
    );

    let outcome = second
        .run(RunPlan::resume(tag("v1.5.3"), ResumeToken::Publish))
        .await
        .unwrap();

    assert_eq!(*stats.built.lock().unwrap(), vec![stuck.clone()]);
    assert_eq!(outcome.skipped.len(), 5);
    assert!(outcome.failed.is_empty());
    assert_eq!(
        second.host().uploaded_names(),
        vec![CHECKSUMS_ASSET.to_string(), asset_name(&stuck, "v1.5.3")]
    );
    assert_eq!(second.host().checksums().unwrap().lines().count(), 6);
}

#[tokio::test]
async fn retried_platform_is_added_to_the_checksums() {
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("caddy.json");
    let i386 = Platform::new("linux", "386", "");

    let mut first = pipeline_with_state(
        FakeGit::with_tags(&["v1.5.2"]),
        FakeBackend::new().failing_on(i386.clone()),
        FakeHost::new(),
        FakeNotifier::failing(),
        &state_file,
    );
    first
        .run(RunPlan::new_release(tag("v1.5.3")))
        .await
        .unwrap_err();

    let first_sums = first.host().checksums().unwrap();
    assert_eq!(first_sums.lines().count(), 5);
    assert!(!first_sums.contains(&asset_name(&i386, "v1.5.3")));

    let mut second = pipeline_with_state(
        FakeGit::with_tags(&["v1.5.2", "v1.5.3"]),
        FakeBackend::new(),
        FakeHost::resumed_from(first.host()),
        FakeNotifier::new(),
        &state_file,
    );
    let outcome = second
        .run(RunPlan::resume(tag("v1.5.3"), ResumeToken::Publish))
        .await
        .unwrap();

    assert_eq!(outcome.uploaded.len(), 1);
    assert!(outcome.checksums_uploaded);
    assert_eq!(second.host().deleted(), vec![CHECKSUMS_ASSET]);

    let sums = second.host().checksums().unwrap();
    assert_eq!(sums.lines().count(), 6);
    assert!(sums.contains(&asset_name(&i386, "v1.5.3")));
    // Earlier entries survive unchanged
    for line in first_sums.lines() {
        assert!(sums.contains(line), "{line} dropped");
    }
    assert_eq!(second.notifier().calls(), vec!["v1.5.3"]);
}

#[tokio::test]
async fn release_deleted_on_the_host_is_published_again() {
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("caddy.json");

    let mut first = pipeline_with_state(
        FakeGit::with_tags(&["v1.5.2"]),
        FakeBackend::new(),
        FakeHost::new(),
        FakeNotifier::failing(),
        &state_file,
    );
    first
        .run(RunPlan::new_release(tag("v1.5.3")))
        .await
        .unwrap_err();

    // Someone removed the release by hand before the retry
    let mut second = pipeline_with_state(
        FakeGit::with_tags(&["v1.5.3"]),
        FakeBackend::new(),
        FakeHost::new(),
        FakeNotifier::new(),
        &state_file,
    );
    let outcome = second
        .run(RunPlan::resume(tag("v1.5.3"), ResumeToken::Publish))
        .await
        .unwrap();

    assert_eq!(second.host().created().len(), 1);
    assert_eq!(outcome.spawned_units, 6);
    assert_eq!(
        second.host().uploaded_names(),
        expected_assets("v1.5.3", &six_platforms())
    );
}

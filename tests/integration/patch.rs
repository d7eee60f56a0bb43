use crate::{InstalledApp, NEW_IMAGE, OLD_IMAGE};
use autoupdate::constants::RESTORE_ATTEMPTS;
use autoupdate::core::UpdateError;
use autoupdate::manifest::{PatchType, UpdateManifest};
use autoupdate::patch::verification::ChecksumVerifier;
use autoupdate::patch::{ApplyOutcome, ApplyState, PatchApplier};
use autoupdate::config::UpdateConfig;
use autoupdate::test_utils::{FailingFileOps, init_test_logging, public_key_hex, test_config};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn asset_server(status: u16, body: &[u8]) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/asset"))
        .respond_with(ResponseTemplate::new(status).set_body_bytes(body.to_vec()))
        .mount(&server)
        .await;
    server
}

fn manifest_for(server: &MockServer, image: &[u8]) -> UpdateManifest {
    UpdateManifest {
        version: "9.3.3".to_string(),
        url: format!("{}/asset", server.uri()),
        checksum: Some(ChecksumVerifier::digest(image)),
        content_length: None,
        patch_type: PatchType::Full,
    }
}

#[tokio::test]
async fn test_apply_commits_new_executable() {
    init_test_logging(None);
    let app = InstalledApp::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(app.exe(), std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    // Left behind by an earlier update whose cleanup failed
    std::fs::write(app.backup(), b"stale").unwrap();

    let server = asset_server(200, NEW_IMAGE).await;
    let config = test_config("2.2.0", &server.uri(), app.exe());

    let outcome = PatchApplier::new(&config).apply(&manifest_for(&server, NEW_IMAGE)).await;

    assert!(matches!(&outcome, ApplyOutcome::Committed(v) if v == "9.3.3"), "got {outcome:?}");
    assert_eq!(app.contents(), NEW_IMAGE);
    assert_eq!(app.files(), vec!["app".to_string()]);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(app.exe()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}

#[tokio::test]
async fn test_checksum_mismatch_leaves_executable_untouched() {
    let app = InstalledApp::new();
    let server = asset_server(200, b"tampered image").await;
    let config = test_config("2.2.0", &server.uri(), app.exe());

    let outcome = PatchApplier::new(&config).apply(&manifest_for(&server, NEW_IMAGE)).await;

    assert!(
        matches!(outcome, ApplyOutcome::RolledBack(UpdateError::ChecksumMismatch { .. })),
        "got {outcome:?}"
    );
    assert_eq!(app.contents(), OLD_IMAGE);
    assert_eq!(app.files(), vec!["app".to_string()]);
}

#[tokio::test]
async fn test_download_failure_is_rolled_back() {
    let app = InstalledApp::new();
    let server = asset_server(404, b"").await;
    let config = test_config("2.2.0", &server.uri(), app.exe());

    let outcome = PatchApplier::new(&config).apply(&manifest_for(&server, NEW_IMAGE)).await;

    assert_eq!(outcome.state(), ApplyState::RolledBack);
    match outcome {
        ApplyOutcome::RolledBack(err) => assert_eq!(err.status_code(), Some(404)),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(app.contents(), OLD_IMAGE);
}

#[tokio::test]
async fn test_failed_install_restores_original() {
    let app = InstalledApp::new();
    let server = asset_server(200, NEW_IMAGE).await;
    let config = test_config("2.2.0", &server.uri(), app.exe());
    let ops = Arc::new(FailingFileOps::fail_install());

    let outcome = PatchApplier::new(&config)
        .with_file_ops(ops.clone())
        .apply(&manifest_for(&server, NEW_IMAGE))
        .await;

    assert!(
        matches!(outcome, ApplyOutcome::RolledBack(UpdateError::SwapFailed { .. })),
        "got {outcome:?}"
    );
    assert_eq!(app.contents(), OLD_IMAGE);
    assert_eq!(app.files(), vec!["app".to_string()]);

    let renames = ops.renames();
    assert_eq!(renames.len(), 3);
    assert_eq!(renames[0], (app.exe().to_path_buf(), app.backup()));
    assert_eq!(renames[2], (app.backup(), app.exe().to_path_buf()));
}

#[tokio::test]
async fn test_failed_stash_never_touches_executable() {
    let app = InstalledApp::new();
    let server = asset_server(200, NEW_IMAGE).await;
    let config = test_config("2.2.0", &server.uri(), app.exe());
    let ops = Arc::new(FailingFileOps::fail_stash());

    let outcome = PatchApplier::new(&config)
        .with_file_ops(ops.clone())
        .apply(&manifest_for(&server, NEW_IMAGE))
        .await;

    assert_eq!(outcome.state(), ApplyState::RolledBack);
    assert_eq!(ops.renames().len(), 1);
    assert_eq!(app.contents(), OLD_IMAGE);
    assert_eq!(app.files(), vec!["app".to_string()]);
}

#[tokio::test]
async fn test_failed_restore_is_unrecoverable() {
    let app = InstalledApp::new();
    let server = asset_server(200, NEW_IMAGE).await;
    let config = test_config("2.2.0", &server.uri(), app.exe());
    let ops = Arc::new(FailingFileOps::fail_install_and_restore());

    let outcome = PatchApplier::new(&config)
        .with_file_ops(ops.clone())
        .apply(&manifest_for(&server, NEW_IMAGE))
        .await;

    let err = match outcome {
        ApplyOutcome::Unrecoverable(err) => err,
        other => panic!("expected unrecoverable outcome, got {other:?}"),
    };
    assert!(err.is_fatal());
    assert!(matches!(err, UpdateError::Unrecoverable { .. }));

    // The original survives only as the backup
    assert!(!app.exe().exists());
    assert_eq!(std::fs::read(app.backup()).unwrap(), OLD_IMAGE);
    // Stash, install, then every restore attempt
    assert_eq!(ops.renames().len(), 2 + RESTORE_ATTEMPTS as usize);
}

#[tokio::test]
async fn test_missing_backup_is_unrecoverable() {
    let app = InstalledApp::new();
    let server = asset_server(200, NEW_IMAGE).await;
    let config = test_config("2.2.0", &server.uri(), app.exe());
    let ops = Arc::new(FailingFileOps::lose_backup());

    let outcome = PatchApplier::new(&config)
        .with_file_ops(ops.clone())
        .apply(&manifest_for(&server, NEW_IMAGE))
        .await;

    assert_eq!(outcome.state(), ApplyState::Unrecoverable);
    let err = outcome.into_result().unwrap_err();
    assert!(matches!(err, UpdateError::Unrecoverable { .. }), "got {err:?}");
    assert!(err.to_string().contains("no backup found"), "got {err}");
    // Stash and install only: a missing backup is not retried
    assert_eq!(ops.renames().len(), 2);
    assert!(app.files().is_empty(), "left {:?}", app.files());
}

#[tokio::test]
async fn test_interrupted_update_is_recovered_before_applying() {
    let app = InstalledApp::new();
    // An earlier attempt moved the executable aside and never put it back
    std::fs::rename(app.exe(), app.backup()).unwrap();

    let server = asset_server(200, NEW_IMAGE).await;
    let config = test_config("2.2.0", &server.uri(), app.exe());

    let outcome = PatchApplier::new(&config).apply(&manifest_for(&server, NEW_IMAGE)).await;

    assert!(matches!(&outcome, ApplyOutcome::Committed(v) if v == "9.3.3"), "got {outcome:?}");
    assert_eq!(app.contents(), NEW_IMAGE);
    assert_eq!(app.files(), vec!["app".to_string()]);
}

#[tokio::test]
async fn test_interrupted_update_keeps_original_when_download_fails() {
    let app = InstalledApp::new();
    std::fs::rename(app.exe(), app.backup()).unwrap();

    let server = asset_server(500, b"").await;
    let config = test_config("2.2.0", &server.uri(), app.exe());

    let outcome = PatchApplier::new(&config).apply(&manifest_for(&server, NEW_IMAGE)).await;

    assert_eq!(outcome.state(), ApplyState::RolledBack);
    assert_eq!(app.contents(), OLD_IMAGE);
    assert_eq!(app.files(), vec!["app".to_string()]);
}

#[tokio::test]
async fn test_missing_executable_without_backup_is_unrecoverable() {
    let app = InstalledApp::new();
    std::fs::remove_file(app.exe()).unwrap();

    let server = asset_server(200, NEW_IMAGE).await;
    let config = test_config("2.2.0", &server.uri(), app.exe());

    let outcome = PatchApplier::new(&config).apply(&manifest_for(&server, NEW_IMAGE)).await;

    assert_eq!(outcome.state(), ApplyState::Unrecoverable);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_slow_download_outlives_check_timeout() {
    let app = InstalledApp::new();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/asset"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(NEW_IMAGE.to_vec())
                .set_delay(Duration::from_millis(600)),
        )
        .mount(&server)
        .await;

    // Checks give up after 200ms; the download may take longer
    let config = UpdateConfig::builder("2.2.0", server.uri())
        .public_key(public_key_hex())
        .timeout(Duration::from_millis(200))
        .executable_path(app.exe())
        .build()
        .unwrap();

    let outcome = PatchApplier::new(&config).apply(&manifest_for(&server, NEW_IMAGE)).await;

    assert!(matches!(&outcome, ApplyOutcome::Committed(_)), "got {outcome:?}");
    assert_eq!(app.contents(), NEW_IMAGE);
}

use crate::{InstalledApp, NEW_IMAGE, OLD_IMAGE};
use autoupdate::core::UpdateError;
use autoupdate::poller::{PollOutcome, UpdatePoller, apply_next};
use autoupdate::test_utils::{FailingFileOps, ReleaseFixture, init_test_logging, test_config};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A server offering `version` whose asset is [`NEW_IMAGE`].
async fn update_server(version: &str) -> MockServer {
    let server = MockServer::start().await;
    let release = ReleaseFixture::new(version, format!("{}/asset", server.uri()), NEW_IMAGE);
    Mock::given(method("POST"))
        .and(path("/check"))
        .respond_with(ResponseTemplate::new(200).set_body_string(release.to_json()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/asset"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(NEW_IMAGE.to_vec()))
        .mount(&server)
        .await;
    server
}

fn check_url(server: &MockServer) -> String {
    format!("{}/check", server.uri())
}

async fn asset_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == "/asset")
        .count()
}

#[tokio::test]
async fn test_same_version_is_not_applied() {
    init_test_logging(None);
    let app = InstalledApp::new();
    let server = update_server("2.2.0").await;
    let poller = UpdatePoller::new(test_config("2.2.0", &check_url(&server), app.exe()));

    assert!(matches!(poller.poll_once().await, PollOutcome::NoUpdateAvailable));
    assert_eq!(asset_requests(&server).await, 0);
    assert_eq!(app.contents(), OLD_IMAGE);
}

#[tokio::test]
async fn test_newer_version_is_applied() {
    let app = InstalledApp::new();
    let server = update_server("9.3.3").await;
    let config = test_config("2.2.0", &check_url(&server), app.exe());

    let version = apply_next(config).await.unwrap();

    assert_eq!(version, "9.3.3");
    assert_eq!(asset_requests(&server).await, 1);
    assert_eq!(app.contents(), NEW_IMAGE);
}

#[tokio::test]
async fn test_rollback_keeps_polling() {
    let app = InstalledApp::new();
    let server = update_server("9.3.3").await;
    let config = test_config("2.2.0", &check_url(&server), app.exe());

    // First attempt fails to install and rolls back; the second succeeds
    let poller =
        UpdatePoller::new(config).with_file_ops(Arc::new(FailingFileOps::fail_install()));

    match poller.poll_once().await {
        PollOutcome::TransientError(UpdateError::SwapFailed { .. }) => {}
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(app.contents(), OLD_IMAGE);

    let result = tokio::time::timeout(Duration::from_secs(10), poller.run(CancellationToken::new()))
        .await
        .expect("poller should apply the update on a later tick")
        .unwrap();
    assert_eq!(result.as_deref(), Some("9.3.3"));
    assert_eq!(app.contents(), NEW_IMAGE);
}

#[tokio::test]
async fn test_unrecoverable_failure_stops_polling() {
    let app = InstalledApp::new();
    let server = update_server("9.3.3").await;
    let config = test_config("2.2.0", &check_url(&server), app.exe());
    let poller = UpdatePoller::new(config)
        .with_file_ops(Arc::new(FailingFileOps::fail_install_and_restore()));

    let err = tokio::time::timeout(Duration::from_secs(10), poller.run(CancellationToken::new()))
        .await
        .expect("poller should stop on its own")
        .unwrap_err();

    assert!(matches!(err, UpdateError::Unrecoverable { .. }), "got {err:?}");
    assert_eq!(asset_requests(&server).await, 1);
}

#[tokio::test]
async fn test_lost_backup_is_fatal() {
    let app = InstalledApp::new();
    let server = update_server("9.3.3").await;
    let config = test_config("2.2.0", &check_url(&server), app.exe());
    let poller = UpdatePoller::new(config).with_file_ops(Arc::new(FailingFileOps::lose_backup()));

    match poller.poll_once().await {
        PollOutcome::FatalError(UpdateError::Unrecoverable { .. }) => {}
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(!app.exe().exists());
    assert!(!app.backup().exists());

    // Nothing left to recover from: the loop stops on its first tick
    let err = tokio::time::timeout(Duration::from_secs(5), poller.run(CancellationToken::new()))
        .await
        .expect("poller should stop on its own")
        .unwrap_err();
    assert!(matches!(err, UpdateError::Unrecoverable { .. }), "got {err:?}");
    assert_eq!(asset_requests(&server).await, 1);
}

#[tokio::test]
async fn test_run_stops_when_backup_is_lost() {
    let app = InstalledApp::new();
    let server = update_server("9.3.3").await;
    let config = test_config("2.2.0", &check_url(&server), app.exe());
    let poller = UpdatePoller::new(config).with_file_ops(Arc::new(FailingFileOps::lose_backup()));

    let err = tokio::time::timeout(Duration::from_secs(5), poller.run(CancellationToken::new()))
        .await
        .expect("poller should stop on its own")
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(err, UpdateError::Unrecoverable { .. }), "got {err:?}");
    assert_eq!(asset_requests(&server).await, 1);
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let app = InstalledApp::new();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let poller = UpdatePoller::new(test_config("2.2.0", &check_url(&server), app.exe()));

    assert!(matches!(poller.poll_once().await, PollOutcome::TransientError(_)));

    let cancel = CancellationToken::new();
    let stopper = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        stopper.cancel();
    });
    assert_eq!(poller.run(cancel).await.unwrap(), None);

    // 50ms interval: the loop kept checking until cancelled
    let checks = server.received_requests().await.unwrap_or_default().len();
    assert!(checks >= 3, "only {checks} checks");
}

#[tokio::test]
async fn test_spawned_poller_stops_on_request() {
    let app = InstalledApp::new();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let config = autoupdate::config::UpdateConfig::builder("2.2.0", check_url(&server))
        .public_key(autoupdate::test_utils::public_key_hex())
        .check_interval(Duration::from_secs(3600))
        .executable_path(app.exe())
        .build()
        .unwrap();

    let handle = UpdatePoller::new(config).spawn();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!handle.is_finished());

    handle.stop();
    let result = tokio::time::timeout(Duration::from_secs(5), handle.join())
        .await
        .expect("cancellation interrupts the hour-long sleep");
    assert_eq!(result.unwrap(), None);
    assert_eq!(app.contents(), OLD_IMAGE);
}

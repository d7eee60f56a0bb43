use crate::{InstalledApp, NEW_IMAGE};
use autoupdate::core::UpdateError;
use autoupdate::mobile::{DownloadProgress, MobileAssetDownloader, NoProgress, check_mobile_update};
use autoupdate::test_utils::{ReleaseFixture, compress_bzip2, test_config};
use std::cell::RefCell;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn large_image() -> Vec<u8> {
    (0..200_000u32).map(|i| (i.wrapping_mul(2654435761) >> 24) as u8).collect()
}

#[tokio::test]
async fn test_download_writes_decompressed_image_with_progress() {
    let image = large_image();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/app.bz2"))
        .and(header("accept-encoding", "gzip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(compress_bzip2(&image)))
        .mount(&server)
        .await;

    let seen = RefCell::new(Vec::<DownloadProgress>::new());
    let sink = |p: DownloadProgress| seen.borrow_mut().push(p);

    let mut destination = Vec::new();
    let written = MobileAssetDownloader::default()
        .download(&format!("{}/app.bz2", server.uri()), &mut destination, &sink)
        .await
        .unwrap();

    assert_eq!(written, image.len() as u64);
    assert_eq!(destination, image);

    let seen = seen.into_inner();
    assert!(!seen.is_empty());
    let percents: Vec<u64> = seen.iter().map(|p| p.percent().unwrap()).collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "not monotonic: {percents:?}");
    assert_eq!(percents.last(), Some(&100));
}

#[tokio::test]
async fn test_concatenated_streams_decode_completely() {
    let mut body = compress_bzip2(b"first half|");
    body.extend(compress_bzip2(b"second half"));

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(&server)
        .await;

    let mut destination = Vec::new();
    let written = MobileAssetDownloader::default()
        .download(&format!("{}/app.bz2", server.uri()), &mut destination, &NoProgress)
        .await
        .unwrap();

    assert_eq!(destination, b"first half|second half");
    assert_eq!(written, destination.len() as u64);
}

#[tokio::test]
async fn test_gateway_timeout_is_unexpected_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(504))
        .mount(&server)
        .await;

    let mut destination = Vec::new();
    let err = MobileAssetDownloader::default()
        .download(&format!("{}/app.bz2", server.uri()), &mut destination, &NoProgress)
        .await
        .unwrap_err();

    assert!(matches!(err, UpdateError::UnexpectedStatus { status: 504, .. }), "got {err:?}");
    assert!(err.to_string().contains("504"));
    assert!(destination.is_empty());
}

#[tokio::test]
async fn test_corrupt_container_is_decompress_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"definitely not bzip2".to_vec()))
        .mount(&server)
        .await;

    let err = MobileAssetDownloader::default()
        .download(&format!("{}/app.bz2", server.uri()), &mut Vec::new(), &NoProgress)
        .await
        .unwrap_err();

    assert!(matches!(err, UpdateError::Decompress { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_download_to_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(compress_bzip2(NEW_IMAGE)))
        .mount(&server)
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let target = dir.path().join("update.apk");
    MobileAssetDownloader::default()
        .download_to_path(&format!("{}/app.bz2", server.uri()), &target, &NoProgress)
        .await
        .unwrap();
    assert_eq!(std::fs::read(&target).unwrap(), NEW_IMAGE);

    // Unwritable destination fails before any request
    let missing = dir.path().join("no-such-dir").join("update.apk");
    let err = MobileAssetDownloader::default()
        .download_to_path(&format!("{}/app.bz2", server.uri()), &missing, &NoProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, UpdateError::Io(_)), "got {err:?}");
}

#[tokio::test]
async fn test_check_mobile_update_gates_on_version() {
    let app = InstalledApp::new();
    let server = MockServer::start().await;
    let asset_url = format!("{}/app.bz2", server.uri());
    Mock::given(method("POST"))
        .and(path("/check"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(ReleaseFixture::new("9.3.3", &asset_url, NEW_IMAGE).to_json()),
        )
        .mount(&server)
        .await;
    let check_url = format!("{}/check", server.uri());

    let older = test_config("2.2.0", &check_url, app.exe());
    assert_eq!(check_mobile_update(&older).await.unwrap(), Some(asset_url));

    let same = test_config("9.3.3", &check_url, app.exe());
    assert_eq!(check_mobile_update(&same).await.unwrap(), None);
}

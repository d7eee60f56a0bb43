//! Full-image downloads for platforms that install updates themselves.
//!
//! Mobile platforms own the install step, so the flow is driven by the caller
//! rather than by the poller:
//!
//! 1. [`check_mobile_update`] asks the server and returns the asset URL if the
//!    offered version is newer than the running one.
//! 2. [`MobileAssetDownloader::download`] streams that asset, a
//!    bzip2-compressed full image, into a writer while reporting progress.
//!
//! ```rust,no_run
//! use autoupdate::config::UpdateConfig;
//! use autoupdate::mobile::{DownloadProgress, MobileAssetDownloader, check_mobile_update};
//!
//! # async fn example(config: UpdateConfig) -> autoupdate::core::UpdateResult<()> {
//! if let Some(url) = check_mobile_update(&config).await? {
//!     let downloader = MobileAssetDownloader::default();
//!     let report = |p: DownloadProgress| println!("{:?}%", p.percent());
//!     downloader.download_to_path(&url, "update.apk".as_ref(), &report).await?;
//! }
//! # Ok(())
//! # }
//! ```

mod decompress;
pub mod progress;

pub use progress::{DownloadProgress, NoProgress, ProgressSink};

use crate::config::UpdateConfig;
use crate::core::{UpdateError, UpdateResult};
use crate::fetch::ManifestFetcher;
use crate::version::VersionComparator;
use decompress::StreamDecoder;
use futures::StreamExt;
use reqwest::StatusCode;
use reqwest::header::ACCEPT_ENCODING;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Check for an update and return its asset URL if it is newer.
///
/// `Ok(None)` covers both "server has nothing" and "server offers a version
/// that is not newer".
pub async fn check_mobile_update(config: &UpdateConfig) -> UpdateResult<Option<String>> {
    let Some(manifest) = ManifestFetcher::new(config).check().await? else {
        return Ok(None);
    };

    if VersionComparator::is_newer(config.version(), &manifest.version) {
        info!("Mobile update {} available at {}", manifest.version, manifest.url);
        Ok(Some(manifest.url))
    } else {
        debug!(
            "Offered version {} is not newer than {}",
            manifest.version,
            config.current_version()
        );
        Ok(None)
    }
}

/// Streams bzip2-compressed full images.
///
/// One request per call and no retries; a failed download is reported to the
/// caller, who decides whether to try again.
#[derive(Debug, Clone, Default)]
pub struct MobileAssetDownloader {
    client: reqwest::Client,
}

impl MobileAssetDownloader {
    /// Create a downloader issuing requests through `client`.
    ///
    /// Full images can be large: the client should not carry a short total
    /// request timeout.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Download `url`, writing the decompressed image to `destination`.
    ///
    /// The sink sees one [`DownloadProgress`] per chunk received. Returns the
    /// number of decompressed bytes written.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::UnexpectedStatus`] for anything but `200 OK`
    /// - [`UpdateError::Network`] if the transfer breaks off
    /// - [`UpdateError::Decompress`] for a corrupt or truncated container
    /// - [`UpdateError::Io`] if writing to `destination` fails
    ///
    /// On error `destination` may hold a partial image and should be discarded.
    pub async fn download<W, P>(
        &self,
        url: &str,
        destination: &mut W,
        progress: &P,
    ) -> UpdateResult<u64>
    where
        W: Write + ?Sized,
        P: ProgressSink + ?Sized,
    {
        debug!("Downloading mobile update from {}", url);

        let response = self.client.get(url).header(ACCEPT_ENCODING, "gzip").send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(UpdateError::UnexpectedStatus {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let total = response.content_length();
        let mut transferred = 0u64;
        let mut written = 0u64;
        let mut decoder = StreamDecoder::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            transferred += chunk.len() as u64;
            progress.report(DownloadProgress { transferred, total });
            written += decoder.feed(&chunk, destination)?;
        }

        decoder.finish()?;
        destination.flush()?;

        info!("Downloaded {} bytes, wrote {} bytes", transferred, written);
        Ok(written)
    }

    /// Download `url` into a new file at `path`.
    ///
    /// The file is created before the request is made, so an unwritable path
    /// fails without touching the network. Data is synced to disk before
    /// this returns.
    pub async fn download_to_path<P>(
        &self,
        url: &str,
        path: &Path,
        progress: &P,
    ) -> UpdateResult<u64>
    where
        P: ProgressSink + ?Sized,
    {
        let file = tokio::fs::File::create(path).await?.into_std().await;
        let mut writer = BufWriter::new(file);
        let written = self.download(url, &mut writer, progress).await?;

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            writer.into_inner().map_err(|e| e.into_error())?.sync_all()
        })
        .await
        .map_err(std::io::Error::other)??;

        Ok(written)
    }
}

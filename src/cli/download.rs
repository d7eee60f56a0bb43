use crate::constants::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT};
use crate::mobile::{DownloadProgress, MobileAssetDownloader};
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

/// Download a bzip2-compressed full image and decompress it to a file.
#[derive(Debug, Args)]
pub struct DownloadCommand {
    /// Asset URL
    pub url: String,

    /// File to write the decompressed image to
    pub destination: PathBuf,
}

impl DownloadCommand {
    /// Run the download, drawing a progress bar unless `no_progress`.
    pub async fn execute(self, no_progress: bool) -> Result<()> {
        let client = reqwest::Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .read_timeout(DEFAULT_READ_TIMEOUT)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;
        let downloader = MobileAssetDownloader::new(client);

        let bar = if no_progress {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(0);
            bar.set_style(download_style());
            bar.set_prefix("Downloading");
            bar
        };

        let report = |progress: DownloadProgress| {
            if let Some(total) = progress.total {
                bar.set_length(total);
            }
            bar.set_position(progress.transferred);
        };

        let written = downloader
            .download_to_path(&self.url, &self.destination, &report)
            .await
            .with_context(|| format!("Failed to download {}", self.url));

        match written {
            Ok(written) => {
                bar.finish_and_clear();
                println!(
                    "{} {} bytes to {}",
                    "Wrote".green().bold(),
                    written,
                    self.destination.display()
                );
                Ok(())
            }
            Err(e) => {
                bar.abandon();
                // Partial images are never useful
                let _ = std::fs::remove_file(&self.destination);
                Err(e)
            }
        }
    }
}

fn download_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸━")
}

use crate::config::UpdateSettings;
use crate::poller::UpdatePoller;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Poll the update server and apply the first newer release.
#[derive(Debug, Args)]
pub struct WatchCommand {
    /// Version of the executable being updated
    #[arg(long, default_value = env!("CARGO_PKG_VERSION"))]
    pub current_version: String,

    /// Executable to update, defaults to this binary
    #[arg(long)]
    pub executable: Option<PathBuf>,

    /// Seconds between checks, overriding the settings file
    #[arg(long)]
    pub interval: Option<u64>,
}

impl WatchCommand {
    /// Poll until an update is applied, Ctrl-C is pressed, or polling fails.
    pub async fn execute(self, settings: UpdateSettings) -> Result<()> {
        let mut builder = settings.into_builder(&self.current_version);
        if let Some(executable) = self.executable {
            builder = builder.executable_path(executable);
        }
        if let Some(interval) = self.interval {
            builder = builder.check_interval(Duration::from_secs(interval));
        }
        let config = builder.build().context("Invalid update settings")?;

        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, stopping after the current check");
                on_interrupt.cancel();
            }
        });

        match UpdatePoller::new(config).run(cancel).await? {
            Some(version) => {
                println!("{} {}", "Updated to".green().bold(), version.bold());
            }
            None => println!("Stopped without updating"),
        }
        Ok(())
    }
}


//! Command-line interface for the `autoupdate` binary.
//!
//! The binary is a thin front end over the library, useful for checking an
//! update server by hand and for driving updates of an installed program.
//!
//! # Commands
//!
//! - `check` - Ask the server once whether an update is available
//! - `watch` - Poll until an update is applied to an executable
//! - `download` - Fetch a bzip2-compressed full image with a progress bar
//!
//! # Global Options
//!
//! - `--verbose` / `--quiet` - Log at debug level, or errors only
//! - `--config <PATH>` - Settings file (see [`UpdateSettings`])
//! - `--no-progress` - Disable progress bars
//!
//! `RUST_LOG`, when set, overrides the verbosity flags.
//!
//! # Examples
//!
//! ```bash
//! autoupdate check --current-version 2.2.0
//! autoupdate --verbose watch --executable /usr/local/bin/app --current-version 2.2.0
//! autoupdate download https://updates.example.com/app.bz2 ./app.apk
//! ```

mod check;
mod download;
mod watch;

use crate::config::UpdateSettings;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub use check::CheckCommand;
pub use download::DownloadCommand;
pub use watch::WatchCommand;

/// Top-level command line.
#[derive(Debug, Parser)]
#[command(
    name = "autoupdate",
    about = "Check for, verify and apply signed self-updates",
    version,
    long_about = "autoupdate talks to a self-update server: it checks for newer releases, \
                  verifies their signatures and swaps executables with rollback."
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    ///
    /// Equivalent to `RUST_LOG=debug`. Mutually exclusive with `--quiet`.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the settings file.
    ///
    /// Defaults to `$AUTOUPDATE_CONFIG`, then `<config dir>/autoupdate/config.toml`.
    #[arg(short, long, global = true, env = "AUTOUPDATE_CONFIG")]
    config: Option<PathBuf>,

    /// Disable progress bars.
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Ask the update server once whether an update is available
    Check(CheckCommand),

    /// Poll the update server and apply the first newer release
    Watch(WatchCommand),

    /// Download a bzip2-compressed full image
    Download(DownloadCommand),
}

impl Cli {
    /// Set up logging and run the selected command.
    pub async fn execute(self) -> Result<()> {
        init_logging(self.log_filter());

        let no_progress = self.no_progress || self.quiet;
        let config_path = self.config;
        match self.command {
            Commands::Check(cmd) => cmd.execute(load_settings(config_path).await?).await,
            Commands::Watch(cmd) => cmd.execute(load_settings(config_path).await?).await,
            Commands::Download(cmd) => cmd.execute(no_progress).await,
        }
    }

    /// Log filter implied by the verbosity flags.
    #[must_use]
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        }
    }
}

async fn load_settings(path: Option<PathBuf>) -> Result<UpdateSettings> {
    UpdateSettings::load(path.as_deref()).await
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`. Calling this twice is
/// harmless; the second call is ignored.
pub fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

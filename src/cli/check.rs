use crate::config::UpdateSettings;
use crate::fetch::ManifestFetcher;
use crate::version::VersionComparator;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

/// Ask the update server once whether an update is available.
#[derive(Debug, Args)]
pub struct CheckCommand {
    /// Version to report as currently running
    #[arg(long, default_value = env!("CARGO_PKG_VERSION"))]
    pub current_version: String,

    /// Release channel, overriding the settings file
    #[arg(long)]
    pub channel: Option<String>,
}

impl CheckCommand {
    /// Run the check and print what the server offers.
    pub async fn execute(self, mut settings: UpdateSettings) -> Result<()> {
        if self.channel.is_some() {
            settings.channel = self.channel;
        }
        let config = settings
            .into_config(&self.current_version)
            .context("Invalid update settings")?;

        let Some(manifest) = ManifestFetcher::new(&config).check().await? else {
            println!("{} {}", "Up to date:".green(), config.current_version());
            return Ok(());
        };

        if VersionComparator::is_newer(config.version(), &manifest.version) {
            println!(
                "{} {} -> {}",
                "Update available:".yellow().bold(),
                config.current_version(),
                manifest.version.bold()
            );
            println!("  {}", manifest.url);
        } else {
            println!(
                "{} {} (server offers {})",
                "Up to date:".green(),
                config.current_version(),
                manifest.version
            );
        }

        Ok(())
    }
}

//! The polling loop.
//!
//! [`UpdatePoller`] checks the update server every
//! [`check_interval`](crate::config::UpdateConfig::check_interval) and applies
//! the first offer that is actually newer than the running version. Most
//! failures are logged and retried on the next tick; the loop only ends when:
//!
//! - an update is committed (`Ok(Some(version))`): the caller should restart
//!   into the new executable
//! - the [`CancellationToken`] fires (`Ok(None)`)
//! - a fatal error occurs (`Err`), most importantly
//!   [`UpdateError::Unrecoverable`] after a failed rollback
//!
//! Cancellation only interrupts the wait between ticks. A check or apply that
//! has started runs to completion.
//!
//! # Examples
//!
//! ```rust,no_run
//! use autoupdate::config::UpdateConfig;
//! use autoupdate::poller::UpdatePoller;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let url = "https://updates.example.com/check";
//! let config = UpdateConfig::builder(env!("CARGO_PKG_VERSION"), url)
//!     .public_key("2a1d0b3b5a7c3e9f8d6a4c2e0b1f3d5c7e9a0b2c4d6e8f0a1b3c5d7e9f0a2b4c")
//!     .build()?;
//!
//! let handle = UpdatePoller::new(config).spawn();
//! // ... later, on shutdown
//! handle.stop();
//! if let Some(version) = handle.join().await? {
//!     println!("updated to {version}, restart to use it");
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::UpdateConfig;
use crate::core::{UpdateError, UpdateResult};
use crate::fetch::ManifestFetcher;
use crate::patch::fs_ops::{FileOps, StdFileOps};
use crate::patch::{ApplyOutcome, PatchApplier};
use crate::version::VersionComparator;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Result of a single tick.
#[derive(Debug)]
pub enum PollOutcome {
    /// Nothing newer is on offer.
    NoUpdateAvailable,
    /// The given version has been installed.
    AlreadyUpdated(String),
    /// The tick failed in a way the next tick may not.
    TransientError(UpdateError),
    /// The tick failed in a way that must stop polling.
    FatalError(UpdateError),
}

/// Periodically checks for and applies updates.
pub struct UpdatePoller {
    config: UpdateConfig,
    ops: Arc<dyn FileOps>,
}

impl UpdatePoller {
    /// Create a poller for `config`.
    pub fn new(config: UpdateConfig) -> Self {
        Self {
            config,
            ops: Arc::new(StdFileOps),
        }
    }

    /// Route the executable swap through `ops`.
    pub fn with_file_ops(mut self, ops: Arc<dyn FileOps>) -> Self {
        self.ops = ops;
        self
    }

    /// The configuration being polled for.
    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    /// Run one check and, if warranted, one apply attempt.
    pub async fn poll_once(&self) -> PollOutcome {
        let manifest = match ManifestFetcher::new(&self.config).check().await {
            Ok(Some(manifest)) => manifest,
            Ok(None) => {
                debug!("Already up to date at {}", self.config.current_version());
                return PollOutcome::NoUpdateAvailable;
            }
            Err(e) if e.is_fatal() => return PollOutcome::FatalError(e),
            Err(e) => {
                warn!("Problem checking for update: {}", e);
                return PollOutcome::TransientError(e);
            }
        };

        if !VersionComparator::is_newer(self.config.version(), &manifest.version) {
            debug!(
                "Already up to date at {} (server offers {})",
                self.config.current_version(),
                manifest.version
            );
            return PollOutcome::NoUpdateAvailable;
        }

        info!(
            "Attempting to update from {} to {}",
            self.config.current_version(),
            manifest.version
        );

        let applier = PatchApplier::new(&self.config).with_file_ops(Arc::clone(&self.ops));
        match applier.apply(&manifest).await {
            ApplyOutcome::Committed(version) => PollOutcome::AlreadyUpdated(version),
            ApplyOutcome::RolledBack(e) => {
                warn!("Update to {} rolled back: {}", manifest.version, e);
                PollOutcome::TransientError(e)
            }
            ApplyOutcome::Unrecoverable(e) => PollOutcome::FatalError(e),
        }
    }

    /// Poll until an update is applied, `cancel` fires, or polling must stop.
    pub async fn run(&self, cancel: CancellationToken) -> UpdateResult<Option<String>> {
        let interval = self.config.check_interval();
        info!(
            "Checking for updates to {} every {:?}",
            self.config.current_version(),
            interval
        );

        loop {
            if cancel.is_cancelled() {
                info!("Update polling cancelled");
                return Ok(None);
            }

            match self.poll_once().await {
                PollOutcome::AlreadyUpdated(version) => {
                    info!("Applied update to {}", version);
                    return Ok(Some(version));
                }
                PollOutcome::FatalError(e) => {
                    error!("Stopping update polling: {}", e);
                    return Err(e);
                }
                PollOutcome::NoUpdateAvailable | PollOutcome::TransientError(_) => {}
            }

            tokio::select! {
                () = cancel.cancelled() => {
                    info!("Update polling cancelled");
                    return Ok(None);
                }
                () = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// Run the loop on its own task.
    pub fn spawn(self) -> PollerHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move { self.run(token).await });
        PollerHandle { cancel, task }
    }
}

/// Control over a spawned [`UpdatePoller`].
pub struct PollerHandle {
    cancel: CancellationToken,
    task: JoinHandle<UpdateResult<Option<String>>>,
}

impl PollerHandle {
    /// Ask the poller to stop at the next opportunity.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Whether the poller has finished.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the poller to finish and return its result.
    pub async fn join(self) -> UpdateResult<Option<String>> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(UpdateError::Cancelled),
        }
    }
}

/// Poll with `config` until an update is applied, returning its version.
///
/// There is no way to stop this loop from outside; use [`UpdatePoller::run`]
/// or [`UpdatePoller::spawn`] for that.
pub async fn apply_next(config: UpdateConfig) -> UpdateResult<String> {
    UpdatePoller::new(config)
        .run(CancellationToken::new())
        .await?
        .ok_or(UpdateError::Cancelled)
}

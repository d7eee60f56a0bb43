//! Applying a verified update to the running executable.
//!
//! [`PatchApplier::apply`] drives one update attempt through a fixed sequence
//! of states:
//!
//! ```text
//! Idle -> Downloading -> Verifying -> Swapping -> Committed
//!              |             |           |
//!              +-------------+-----------+-> RolledBack
//!                                        +-> Unrecoverable
//! ```
//!
//! - **Downloading**: fetch the asset named by the manifest.
//! - **Verifying**: run the [`PatchEngine`](engine::PatchEngine) over the
//!   current executable and the asset, stage the result next to the
//!   executable and check its SHA-256 against the manifest.
//! - **Swapping**: move the executable to its backup path, move the staged
//!   image into place, then drop the backup.
//!
//! An attempt that finds the executable missing and its backup present, as
//! left by an earlier unrecoverable attempt, first moves the backup back.
//! Without either file the attempt is unrecoverable from the start.
//!
//! Anything that fails before the executable is moved leaves it untouched and
//! is reported as [`ApplyOutcome::RolledBack`]. If installing the staged image
//! fails, the backup is renamed back; only if *that* also fails is the result
//! [`ApplyOutcome::Unrecoverable`], the one outcome after which the program
//! may no longer be runnable.
//!
//! An attempt is not cancellable once started. Callers that stop polling wait
//! for the current attempt to reach one of the three outcomes.

pub mod backup;
pub mod engine;
pub mod fs_ops;
pub mod verification;

use crate::config::UpdateConfig;
use crate::core::{UpdateError, UpdateResult};
use crate::manifest::UpdateManifest;
use backup::BackupManager;
use fs_ops::{FileOps, StdFileOps};
use reqwest::StatusCode;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;
use tracing::{debug, error, info, warn};
use verification::ChecksumVerifier;

/// Where an update attempt currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyState {
    /// Nothing started yet
    Idle,
    /// Fetching the asset
    Downloading,
    /// Producing and checking the new image
    Verifying,
    /// Moving executables around
    Swapping,
    /// The new executable is in place
    Committed,
    /// The attempt failed and the original executable is in place
    RolledBack,
    /// The attempt failed and the original could not be put back
    Unrecoverable,
}

impl ApplyState {
    /// Lowercase name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Downloading => "downloading",
            Self::Verifying => "verifying",
            Self::Swapping => "swapping",
            Self::Committed => "committed",
            Self::RolledBack => "rolled-back",
            Self::Unrecoverable => "unrecoverable",
        }
    }

    /// Whether the attempt is over.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack | Self::Unrecoverable)
    }
}

impl fmt::Display for ApplyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an update attempt ended.
#[derive(Debug)]
pub enum ApplyOutcome {
    /// The executable now runs the given version.
    Committed(String),
    /// The update failed; the executable is byte-identical to before.
    RolledBack(UpdateError),
    /// The update failed and so did restoring the original.
    ///
    /// Always carries [`UpdateError::Unrecoverable`].
    Unrecoverable(UpdateError),
}

impl ApplyOutcome {
    /// The terminal state this outcome corresponds to.
    pub fn state(&self) -> ApplyState {
        match self {
            Self::Committed(_) => ApplyState::Committed,
            Self::RolledBack(_) => ApplyState::RolledBack,
            Self::Unrecoverable(_) => ApplyState::Unrecoverable,
        }
    }

    /// Collapse into a result carrying the installed version.
    pub fn into_result(self) -> UpdateResult<String> {
        match self {
            Self::Committed(version) => Ok(version),
            Self::RolledBack(e) | Self::Unrecoverable(e) => Err(e),
        }
    }
}

/// Applies verified manifests to the configured executable.
pub struct PatchApplier<'a> {
    config: &'a UpdateConfig,
    ops: Arc<dyn FileOps>,
}

impl<'a> PatchApplier<'a> {
    /// Create an applier using the real filesystem.
    pub fn new(config: &'a UpdateConfig) -> Self {
        Self {
            config,
            ops: Arc::new(StdFileOps),
        }
    }

    /// Route every rename and removal of the swap through `ops`.
    pub fn with_file_ops(mut self, ops: Arc<dyn FileOps>) -> Self {
        self.ops = ops;
        self
    }

    /// Run one update attempt for `manifest`.
    ///
    /// Never returns early with the executable moved away: every path ends in
    /// one of the three [`ApplyOutcome`]s.
    pub async fn apply(&self, manifest: &UpdateManifest) -> ApplyOutcome {
        let mut state = ApplyState::Idle;

        let exe = match self.config.executable_path() {
            Ok(path) => path,
            Err(e) => return Self::rolled_back(state, e),
        };
        let backup = BackupManager::new(exe.clone(), Arc::clone(&self.ops));
        match backup.recover_interrupted().await {
            Ok(true) => info!("Restored {:?} left behind by an interrupted update", exe),
            Ok(false) => {
                if let Err(e) = backup.remove_stale().await {
                    warn!("Could not remove stale backup {:?}: {}", backup.backup_path(), e);
                }
            }
            Err(e) => {
                let error = UpdateError::Unrecoverable {
                    path: exe,
                    cause: "executable is missing".to_string(),
                    recovery: e.to_string(),
                };
                error!("{}", error);
                return ApplyOutcome::Unrecoverable(error);
            }
        }

        Self::transition(&mut state, ApplyState::Downloading);
        let asset = match self.download(manifest).await {
            Ok(bytes) => bytes,
            Err(e) => return Self::rolled_back(state, e),
        };

        Self::transition(&mut state, ApplyState::Verifying);
        let staged = match self.stage(&exe, manifest, asset).await {
            Ok(path) => path,
            Err(e) => return Self::rolled_back(state, e),
        };

        Self::transition(&mut state, ApplyState::Swapping);
        let outcome = self.swap(&exe, &staged, &backup, manifest).await;
        Self::transition(&mut state, outcome.state());
        outcome
    }

    async fn download(&self, manifest: &UpdateManifest) -> UpdateResult<Vec<u8>> {
        debug!("Downloading update {} from {}", manifest.version, manifest.url);

        let response = self.config.download_client().get(&manifest.url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(UpdateError::UnexpectedStatus {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let bytes = response.bytes().await?;
        if let Some(expected) = manifest.content_length {
            if expected != bytes.len() as u64 {
                return Err(UpdateError::Patch {
                    message: format!("expected {expected} bytes but downloaded {}", bytes.len()),
                });
            }
        }

        debug!("Downloaded {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }

    /// Build the new image in a temporary file beside the executable.
    ///
    /// The returned path is deleted on drop unless it has been moved away.
    async fn stage(
        &self,
        exe: &Path,
        manifest: &UpdateManifest,
        asset: Vec<u8>,
    ) -> UpdateResult<TempPath> {
        let engine = Arc::clone(self.config.patch_engine());
        let exe = exe.to_path_buf();
        let patch_type = manifest.patch_type;
        let checksum = manifest.checksum.clone();

        debug!("Applying {} asset with the {} engine", patch_type, engine.name());

        tokio::task::spawn_blocking(move || -> UpdateResult<TempPath> {
            let original = std::fs::read(&exe)?;
            let image = engine.apply(patch_type, &original, &asset)?;

            if let Some(expected) = checksum.as_deref() {
                ChecksumVerifier::verify(&image, expected)?;
            } else {
                warn!("Manifest carries no checksum, skipping integrity check");
            }

            let dir = exe.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
            let name = exe.file_name().unwrap_or_default().to_string_lossy();
            let mut staged = tempfile::Builder::new()
                .prefix(&format!(".{name}."))
                .suffix(".new")
                .tempfile_in(&dir)?;
            staged.write_all(&image)?;
            staged.as_file().sync_all()?;

            let permissions = std::fs::metadata(&exe)?.permissions();
            std::fs::set_permissions(staged.path(), permissions)?;

            Ok(staged.into_temp_path())
        })
        .await
        .map_err(|e| UpdateError::Patch {
            message: format!("patch task failed: {e}"),
        })?
    }

    async fn swap(
        &self,
        exe: &Path,
        staged: &Path,
        backup: &BackupManager,
        manifest: &UpdateManifest,
    ) -> ApplyOutcome {
        if let Err(e) = backup.stash().await {
            warn!("Could not move {:?} aside, executable untouched: {}", exe, e);
            return ApplyOutcome::RolledBack(UpdateError::SwapFailed {
                path: exe.to_path_buf(),
                source: e,
            });
        }

        match self.ops.rename(staged, exe).await {
            Ok(()) => {
                if let Err(e) = backup.discard().await {
                    // Windows keeps the running image locked; the next attempt removes it
                    warn!("Leaving backup at {:?}: {}", backup.backup_path(), e);
                }
                info!("Updated {:?} to version {}", exe, manifest.version);
                ApplyOutcome::Committed(manifest.version.clone())
            }
            Err(install_error) => {
                let cause = UpdateError::SwapFailed {
                    path: exe.to_path_buf(),
                    source: install_error,
                };
                warn!("{}", cause);

                match backup.restore().await {
                    Ok(()) => ApplyOutcome::RolledBack(cause),
                    Err(recovery_error) => {
                        let error = UpdateError::Unrecoverable {
                            path: exe.to_path_buf(),
                            cause: cause.to_string(),
                            recovery: recovery_error.to_string(),
                        };
                        error!("{}", error);
                        ApplyOutcome::Unrecoverable(error)
                    }
                }
            }
        }
    }

    fn transition(state: &mut ApplyState, next: ApplyState) {
        debug!("Update state: {} -> {}", state, next);
        *state = next;
    }

    fn rolled_back(state: ApplyState, error: UpdateError) -> ApplyOutcome {
        warn!("Update failed while {}: {}", state, error);
        ApplyOutcome::RolledBack(error)
    }
}

use crate::constants::{BACKUP_SUFFIX, RESTORE_ATTEMPTS, RESTORE_RETRY_DELAY};
use crate::patch::fs_ops::FileOps;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Keeps the original executable aside while a new one is moved into place.
///
/// Unlike a copy-based backup, the original is *renamed* to the backup path.
/// The rename is atomic, so at every instant either the executable path holds
/// a complete binary or the backup does, and restoring is another rename.
///
/// # Backup Location
///
/// The backup sits next to the executable with an `.old` suffix:
///
/// - `/usr/local/bin/app` -> `/usr/local/bin/app.old`
/// - `C:\Program Files\App\app.exe` -> `C:\Program Files\App\app.exe.old`
///
/// Keeping it in the same directory keeps it on the same filesystem, which is
/// what makes the renames atomic.
///
/// # Lifecycle
///
/// 1. [`recover_interrupted`](Self::recover_interrupted): if the executable
///    is gone but the backup is not, move the backup back first
/// 2. [`remove_stale`](Self::remove_stale): drop a backup left by an earlier
///    successful update whose cleanup failed (typically Windows, where the
///    running image cannot be deleted)
/// 3. [`stash`](Self::stash): move the executable to the backup path
/// 4. either [`discard`](Self::discard) after the new executable is in place,
///    or [`restore`](Self::restore) if installing it failed
///
/// # Examples
///
/// ```rust,no_run
/// use autoupdate::patch::backup::BackupManager;
/// use autoupdate::patch::fs_ops::StdFileOps;
/// use std::path::PathBuf;
/// use std::sync::Arc;
///
/// let manager = BackupManager::new(PathBuf::from("/usr/local/bin/app"), Arc::new(StdFileOps));
/// assert_eq!(manager.backup_path(), PathBuf::from("/usr/local/bin/app.old").as_path());
/// ```
pub struct BackupManager {
    /// Path to the executable.
    original_path: PathBuf,
    /// Path the executable is moved to during the swap.
    backup_path: PathBuf,
    /// Filesystem operations for every move and removal.
    ops: Arc<dyn FileOps>,
}

impl BackupManager {
    /// Create a `BackupManager` for `executable_path`.
    pub fn new(executable_path: PathBuf, ops: Arc<dyn FileOps>) -> Self {
        let mut backup_path = executable_path.clone();
        backup_path.set_file_name(format!(
            "{}.{}",
            executable_path.file_name().unwrap_or_default().to_string_lossy(),
            BACKUP_SUFFIX
        ));

        Self {
            original_path: executable_path,
            backup_path,
            ops,
        }
    }

    /// Put the backup back if the executable itself is missing.
    ///
    /// Returns `Ok(true)` if a backup was restored and `Ok(false)` if the
    /// executable was present. Fails with [`io::ErrorKind::NotFound`] when
    /// neither file exists, or with the restore error.
    pub async fn recover_interrupted(&self) -> io::Result<bool> {
        if self.original_path.exists() {
            return Ok(false);
        }
        if !self.backup_exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!(
                    "neither {} nor a backup at {} exists",
                    self.original_path.display(),
                    self.backup_path.display()
                ),
            ));
        }

        warn!("Executable {:?} is missing, recovering it from the backup", self.original_path);
        self.restore().await?;
        Ok(true)
    }

    /// Remove a backup left over from a previous run.
    ///
    /// Succeeds silently if there is none. Refuses while the executable is
    /// missing, since the backup is then the only copy.
    pub async fn remove_stale(&self) -> io::Result<()> {
        if !self.original_path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("keeping backup, {} is missing", self.original_path.display()),
            ));
        }
        if self.backup_exists() {
            debug!("Removing stale backup at {:?}", self.backup_path);
            self.ops.remove_file(&self.backup_path).await?;
        }
        Ok(())
    }

    /// Move the executable to the backup path.
    ///
    /// On failure nothing has moved and the executable is untouched.
    pub async fn stash(&self) -> io::Result<()> {
        debug!("Moving {:?} aside to {:?}", self.original_path, self.backup_path);
        self.ops.rename(&self.original_path, &self.backup_path).await
    }

    /// Move the backup back to the executable path.
    ///
    /// A missing backup fails immediately. Otherwise the rename is retried up
    /// to [`RESTORE_ATTEMPTS`] times, since a freshly renamed executable can be
    /// locked for a moment on Windows.
    pub async fn restore(&self) -> io::Result<()> {
        if !self.backup_exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no backup found at {}", self.backup_path.display()),
            ));
        }

        warn!("Restoring executable from backup at {:?}", self.backup_path);

        let mut attempt = 1;
        loop {
            match self.ops.rename(&self.backup_path, &self.original_path).await {
                Ok(()) => {
                    info!("Successfully restored from backup");
                    return Ok(());
                }
                Err(e) if attempt < RESTORE_ATTEMPTS => {
                    warn!("Restore attempt {} failed: {}. Retrying...", attempt, e);
                    tokio::time::sleep(RESTORE_RETRY_DELAY).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(io::Error::new(
                        e.kind(),
                        format!("failed to restore backup after {RESTORE_ATTEMPTS} attempts: {e}"),
                    ));
                }
            }
        }
    }

    /// Remove the backup after a successful swap.
    pub async fn discard(&self) -> io::Result<()> {
        if self.backup_exists() {
            debug!("Cleaning up backup at {:?}", self.backup_path);
            self.ops.remove_file(&self.backup_path).await?;
        }
        Ok(())
    }

    /// Whether a backup file is present.
    pub fn backup_exists(&self) -> bool {
        self.backup_path.exists()
    }

    /// Where the backup lives.
    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }
}

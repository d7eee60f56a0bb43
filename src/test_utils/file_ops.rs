use crate::patch::fs_ops::{FileOps, StdFileOps};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// [`FileOps`] that fails selected renames and performs the rest for real.
///
/// Renames are numbered from 1 in call order. During an apply attempt they
/// are:
///
/// 1. executable -> backup
/// 2. staged image -> executable
/// 3. and later: backup -> executable (restore attempts)
#[derive(Debug, Default)]
pub struct FailingFileOps {
    fail_on: BTreeSet<usize>,
    /// Delete the destination right after the first rename succeeds.
    lose_stashed: bool,
    renames: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl FailingFileOps {
    /// Fail the renames with the given call numbers.
    pub fn failing_renames(calls: impl IntoIterator<Item = usize>) -> Self {
        Self {
            fail_on: calls.into_iter().collect(),
            lose_stashed: false,
            renames: Mutex::new(Vec::new()),
        }
    }

    /// Lose the backup as soon as it is made, then fail installing.
    ///
    /// Restoring then finds no backup to move back.
    pub fn lose_backup() -> Self {
        Self {
            lose_stashed: true,
            ..Self::fail_install()
        }
    }

    /// Fail moving the executable aside.
    pub fn fail_stash() -> Self {
        Self::failing_renames([1])
    }

    /// Fail installing the new executable; restoring succeeds.
    pub fn fail_install() -> Self {
        Self::failing_renames([2])
    }

    /// Fail installing the new executable and every restore attempt.
    pub fn fail_install_and_restore() -> Self {
        Self::failing_renames(2..=64)
    }

    /// Every rename requested so far, failed or not.
    pub fn renames(&self) -> Vec<(PathBuf, PathBuf)> {
        self.renames.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl FileOps for FailingFileOps {
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let call = {
            let mut renames = self.renames.lock().map_err(|_| io::Error::other("poisoned"))?;
            renames.push((from.to_path_buf(), to.to_path_buf()));
            renames.len()
        };

        if self.fail_on.contains(&call) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("injected failure on rename #{call}"),
            ));
        }
        StdFileOps.rename(from, to).await?;
        if call == 1 && self.lose_stashed {
            StdFileOps.remove_file(to).await?;
        }
        Ok(())
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        StdFileOps.remove_file(path).await
    }
}

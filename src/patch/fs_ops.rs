//! Filesystem operations used while swapping executables.
//!
//! Every operation that moves or removes the executable or its backup goes
//! through [`FileOps`], so the swap and rollback paths can be exercised with
//! injected failures.

use async_trait::async_trait;
use std::io;
use std::path::Path;
use tokio::fs;

/// Rename and remove, the only operations the swap needs.
#[async_trait]
pub trait FileOps: Send + Sync {
    /// Atomically move `from` to `to`, replacing `to` where the platform allows.
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Remove a file.
    async fn remove_file(&self, path: &Path) -> io::Result<()>;
}

/// [`FileOps`] backed by `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileOps;

#[async_trait]
impl FileOps for StdFileOps {
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to).await
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path).await
    }
}

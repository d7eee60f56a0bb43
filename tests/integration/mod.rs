//! Integration test suite for autoupdate
//!
//! End-to-end tests against a mock update server (`wiremock`) with real
//! executables swapped inside temporary directories.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **fetch**: Update checks, signature verification and "no update" signals
//! - **mobile**: Streaming bzip2 downloads and progress reporting
//! - **patch**: Commit, rollback and unrecoverable swap outcomes
//! - **poller**: The polling loop, version gating and cancellation

mod mobile;
mod patch;
mod poller;

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Content of the executable before any update.
pub const OLD_IMAGE: &[u8] = b"#!/bin/sh\necho version 2.2.0\n";

/// Content of the executable offered by the server.
pub const NEW_IMAGE: &[u8] = b"#!/bin/sh\necho version 9.3.3\n";

/// A temporary directory holding a fake installed executable.
pub struct InstalledApp {
    _dir: TempDir,
    exe: PathBuf,
}

impl InstalledApp {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let exe = dir.path().join("app");
        std::fs::write(&exe, OLD_IMAGE).unwrap();
        Self { _dir: dir, exe }
    }

    pub fn exe(&self) -> &Path {
        &self.exe
    }

    pub fn contents(&self) -> Vec<u8> {
        std::fs::read(&self.exe).unwrap()
    }

    pub fn backup(&self) -> PathBuf {
        self.exe.with_file_name("app.old")
    }

    /// Names of all files next to the executable.
    pub fn files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.exe.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

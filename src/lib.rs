//! autoupdate - signed self-updates for long-running programs
//!
//! A client for a simple self-update protocol: the program periodically asks
//! an update server whether a newer release exists, verifies the answer
//! against a trusted Ed25519 key, and replaces its own executable in a way
//! that never leaves a half-written binary behind.
//!
//! # Architecture Overview
//!
//! ```text
//! UpdatePoller ──> ManifestFetcher ──> (newer?) ──> PatchApplier
//!      │                                                │
//!      └── sleeps check_interval, cancellable           └── Committed / RolledBack /
//!                                                           Unrecoverable
//!
//! caller ──> check_mobile_update ──> MobileAssetDownloader (bzip2 stream + progress)
//! ```
//!
//! # Core Modules
//!
//! - [`config`] - [`UpdateConfig`](config::UpdateConfig) builder and the TOML settings file
//! - [`fetch`] - Querying the update server and verifying its answer
//! - [`manifest`] - Release announcement wire types and signature checks
//! - [`patch`] - Downloading, patching, verifying and swapping the executable
//! - [`mobile`] - Streaming full-image downloads with progress reporting
//! - [`poller`] - The polling loop tying the above together
//! - [`version`] - Semantic version parsing and the "is newer" decision
//!
//! ## Supporting Modules
//!
//! - [`core`] - Error types and user-facing error formatting
//! - [`constants`] - Defaults shared across modules
//! - [`cli`] - The `autoupdate` command-line front end
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use autoupdate::config::UpdateConfig;
//! use autoupdate::poller::apply_next;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let url = "https://updates.example.com/check";
//! let config = UpdateConfig::builder(env!("CARGO_PKG_VERSION"), url)
//!     .public_key("3b6a27bcceb6a42d62a3a8d02a6f0d73653215771de243a63ac048a18b59da29")
//!     .build()?;
//!
//! let version = apply_next(config).await?;
//! println!("Updated to {version}; restart to run it");
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod fetch;
pub mod manifest;
pub mod mobile;
pub mod patch;
pub mod poller;
pub mod version;

// test_utils is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

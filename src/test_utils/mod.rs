//! Test utilities for autoupdate
//!
//! Helpers shared by unit tests and the integration test target:
//!
//! - [`init_test_logging`] to see `tracing` output in tests
//! - [`fixtures`] for signing keys, signed release documents and compressed
//!   assets
//! - [`FailingFileOps`] for driving the swap into its failure paths
//!
//! Available under `cfg(test)` and with the `test-utils` feature.

pub mod file_ops;
pub mod fixtures;

pub use file_ops::FailingFileOps;
pub use fixtures::{ReleaseFixture, compress_bzip2, public_key_hex, signing_key, test_config};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has any effect. Uses `level` if given, otherwise
/// `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}

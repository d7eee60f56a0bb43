//! Constants shared across the update client.
//!
//! Timeouts, retry parameters and default settings live here so the values
//! the poller, applier and downloader agree on are defined once.

use std::time::Duration;

/// Default interval between update checks (4 hours).
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(4 * 60 * 60);

/// Release channel used when none is configured.
pub const DEFAULT_CHANNEL: &str = "stable";

/// Whole-request timeout for update checks made by the built-in HTTP client.
///
/// Only applies when the caller does not supply its own `reqwest::Client`.
/// Asset downloads are not bounded by it; see [`DEFAULT_READ_TIMEOUT`].
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection timeout for the built-in HTTP clients.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest a download may go without receiving data.
///
/// Executables can be large, so downloads have no total time limit and only
/// abort once the transfer stalls.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Suffix appended to the executable name for the pre-swap backup.
pub const BACKUP_SUFFIX: &str = "old";

/// Number of attempts made to move the backup back into place.
///
/// Windows can keep a just-renamed executable locked for a short time.
pub const RESTORE_ATTEMPTS: u32 = 3;

/// Delay between restore attempts.
pub const RESTORE_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Environment variable overriding the settings file location.
pub const CONFIG_PATH_ENV: &str = "AUTOUPDATE_CONFIG";

//! Update client configuration
//!
//! [`UpdateConfig`] is the immutable per-session configuration every other
//! component reads from. It is built once through [`UpdateConfigBuilder`],
//! which is where the invariants are enforced:
//!
//! - the current version must parse as `MAJOR.MINOR.PATCH`, otherwise
//!   building fails with [`UpdateError::InvalidVersion`] before any polling;
//! - the trusted public key must be a valid Ed25519 key;
//! - a zero check interval falls back to [`DEFAULT_CHECK_INTERVAL`];
//! - operating system and architecture default to the running platform.
//!
//! Two HTTP clients are kept. Update checks go through one bounded by a total
//! request timeout; asset downloads go through one that only gives up when
//! the connection or the transfer stalls, so a slow link can still fetch a
//! large executable. A caller-supplied client is used for both.
//!
//! The parsed [`SemanticVersion`] is memoized in the config so the poller
//! never parses the current version again.
//!
//! # Configuration File
//!
//! The command-line front end reads [`settings::UpdateSettings`] from a TOML
//! file and turns it into an [`UpdateConfig`]:
//!
//! ```toml
//! [update]
//! url = "https://updates.example.com/update"
//! public_key = "3b6a27bcceb6a42d62a3a8d02a6f0d73653215771de243a63ac048a18b59da29"
//! check_interval = 14400
//! channel = "stable"
//! ```
//!
//! # Examples
//!
//! ```rust,no_run
//! use autoupdate::config::UpdateConfig;
//! use std::time::Duration;
//!
//! # fn example(key: &[u8]) -> autoupdate::core::UpdateResult<()> {
//! let config = UpdateConfig::builder("2.2.0", "https://updates.example.com/update")
//!     .public_key(key)
//!     .check_interval(Duration::from_secs(3600))
//!     .channel("beta")
//!     .build()?;
//!
//! assert_eq!(config.version().to_string(), "2.2.0");
//! # Ok(())
//! # }
//! ```

pub mod settings;

pub use settings::UpdateSettings;

use crate::constants::{
    DEFAULT_CHANNEL, DEFAULT_CHECK_INTERVAL, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT,
    DEFAULT_REQUEST_TIMEOUT,
};
use crate::core::{UpdateError, UpdateResult};
use crate::manifest::signature::parse_public_key;
use crate::patch::engine::{FullImage, PatchEngine};
use crate::version::SemanticVersion;
use ed25519_dalek::VerifyingKey;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Immutable configuration for one update session.
#[derive(Clone)]
pub struct UpdateConfig {
    current_version: String,
    version: SemanticVersion,
    url: String,
    public_key: VerifyingKey,
    check_interval: Duration,
    os: String,
    arch: String,
    channel: String,
    http_client: reqwest::Client,
    download_client: reqwest::Client,
    executable_path: Option<PathBuf>,
    patch_engine: Arc<dyn PatchEngine>,
}

impl UpdateConfig {
    /// Start building a configuration for `current_version` checking `url`.
    pub fn builder(
        current_version: impl Into<String>,
        url: impl Into<String>,
    ) -> UpdateConfigBuilder {
        UpdateConfigBuilder::new(current_version, url)
    }

    /// The current version as given by the caller.
    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    /// The parsed current version.
    pub fn version(&self) -> &SemanticVersion {
        &self.version
    }

    /// Update server URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Trusted key for manifest signatures.
    pub fn public_key(&self) -> &VerifyingKey {
        &self.public_key
    }

    /// Time between update checks.
    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    /// Target operating system sent to the server.
    pub fn os(&self) -> &str {
        &self.os
    }

    /// Target architecture sent to the server.
    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// Release channel.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// HTTP client for update checks.
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// HTTP client for asset downloads, without a total request timeout.
    pub fn download_client(&self) -> &reqwest::Client {
        &self.download_client
    }

    /// Engine turning downloaded assets into executables.
    pub fn patch_engine(&self) -> &Arc<dyn PatchEngine> {
        &self.patch_engine
    }

    /// Path of the executable to update.
    ///
    /// Defaults to the running executable.
    pub fn executable_path(&self) -> UpdateResult<PathBuf> {
        match &self.executable_path {
            Some(path) => Ok(path.clone()),
            None => std::env::current_exe().map_err(|e| UpdateError::ConfigError {
                message: format!("cannot locate the running executable: {e}"),
            }),
        }
    }
}

impl fmt::Debug for UpdateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateConfig")
            .field("current_version", &self.current_version)
            .field("url", &self.url)
            .field("public_key", &hex::encode(self.public_key.as_bytes()))
            .field("check_interval", &self.check_interval)
            .field("os", &self.os)
            .field("arch", &self.arch)
            .field("channel", &self.channel)
            .field("executable_path", &self.executable_path)
            .field("patch_engine", &self.patch_engine.name())
            .finish()
    }
}

/// Builder for [`UpdateConfig`].
pub struct UpdateConfigBuilder {
    current_version: String,
    url: String,
    public_key: Option<Vec<u8>>,
    check_interval: Option<Duration>,
    os: Option<String>,
    arch: Option<String>,
    channel: Option<String>,
    http_client: Option<reqwest::Client>,
    timeout: Option<Duration>,
    executable_path: Option<PathBuf>,
    patch_engine: Option<Arc<dyn PatchEngine>>,
}

impl UpdateConfigBuilder {
    fn new(current_version: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            current_version: current_version.into(),
            url: url.into(),
            public_key: None,
            check_interval: None,
            os: None,
            arch: None,
            channel: None,
            http_client: None,
            timeout: None,
            executable_path: None,
            patch_engine: None,
        }
    }

    /// Trusted public key: 32 raw bytes or 64 hex characters. Required.
    pub fn public_key(mut self, key: impl AsRef<[u8]>) -> Self {
        self.public_key = Some(key.as_ref().to_vec());
        self
    }

    /// Time between checks; zero means the default of 4 hours.
    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = Some(interval);
        self
    }

    /// Operating system to ask for (defaults to the running one).
    pub fn os(mut self, os: impl Into<String>) -> Self {
        self.os = Some(os.into());
        self
    }

    /// Architecture to ask for (defaults to the running one).
    pub fn arch(mut self, arch: impl Into<String>) -> Self {
        self.arch = Some(arch.into());
        self
    }

    /// Release channel (defaults to `stable`).
    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Use a caller-supplied HTTP client for checks and downloads alike.
    ///
    /// Its timeouts take precedence, so a total request timeout on it also
    /// bounds how long an executable may take to download.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Total timeout for update checks made by the built-in client.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Executable to patch instead of the running one.
    pub fn executable_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable_path = Some(path.into());
        self
    }

    /// Engine used to apply downloaded patches.
    pub fn patch_engine(mut self, engine: Arc<dyn PatchEngine>) -> Self {
        self.patch_engine = Some(engine);
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::InvalidVersion`] if the current version does not parse
    /// - [`UpdateError::ConfigError`] if the URL or public key is missing, or
    ///   the HTTP client cannot be built
    /// - [`UpdateError::InvalidPublicKey`] if the key is malformed
    pub fn build(self) -> UpdateResult<UpdateConfig> {
        let version = SemanticVersion::parse(&self.current_version)?;

        if self.url.trim().is_empty() {
            return Err(UpdateError::ConfigError {
                message: "update URL is empty".to_string(),
            });
        }

        let key_bytes = self.public_key.ok_or_else(|| UpdateError::ConfigError {
            message: "no public key configured for signature verification".to_string(),
        })?;
        let public_key = parse_public_key(&key_bytes)?;

        let check_interval = match self.check_interval {
            Some(interval) if !interval.is_zero() => interval,
            _ => {
                debug!("Defaulted check interval to {:?}", DEFAULT_CHECK_INTERVAL);
                DEFAULT_CHECK_INTERVAL
            }
        };

        let (http_client, download_client) = match self.http_client {
            Some(client) => (client.clone(), client),
            None => (
                client_builder()
                    .timeout(self.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT))
                    .build()
                    .map_err(client_error)?,
                client_builder()
                    .read_timeout(DEFAULT_READ_TIMEOUT)
                    .build()
                    .map_err(client_error)?,
            ),
        };

        Ok(UpdateConfig {
            current_version: self.current_version.trim().to_string(),
            version,
            url: self.url,
            public_key,
            check_interval,
            os: non_empty_or(self.os, std::env::consts::OS),
            arch: non_empty_or(self.arch, std::env::consts::ARCH),
            channel: non_empty_or(self.channel, DEFAULT_CHANNEL),
            http_client,
            download_client,
            executable_path: self.executable_path,
            patch_engine: self.patch_engine.unwrap_or_else(|| Arc::new(FullImage)),
        })
    }
}

fn client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
}

fn client_error(e: reqwest::Error) -> UpdateError {
    UpdateError::ConfigError {
        message: format!("failed to build HTTP client: {e}"),
    }
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

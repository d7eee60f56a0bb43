//! Asking the update server whether a new release exists.
//!
//! [`ManifestFetcher::check`] posts the client's identity (current version,
//! operating system, architecture and channel) to the configured URL and
//! interprets the answer:
//!
//! | Response                               | Result                         |
//! |----------------------------------------|--------------------------------|
//! | `204 No Content`                       | `Ok(None)`                     |
//! | `200` with `"active": false`           | `Ok(None)`                     |
//! | `200` with a correctly signed release  | `Ok(Some(manifest))`           |
//! | `200` with a bad or missing signature  | `Err(SignatureInvalid)`        |
//! | any other status                       | `Err(ServerError)`             |
//! | transport failure                      | `Err(Network)`                 |
//!
//! The fetcher never mutates local state; the only side effect is the request.

use crate::config::UpdateConfig;
use crate::core::{UpdateError, UpdateResult};
use crate::manifest::{Release, UpdateManifest};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Body of the update query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckParams {
    /// Version of the running program
    pub app_version: String,
    /// Operating system of the running program
    pub os: String,
    /// Architecture of the running program
    pub arch: String,
    /// Release channel to follow
    pub channel: String,
}

impl CheckParams {
    /// Query parameters for `config`.
    pub fn from_config(config: &UpdateConfig) -> Self {
        Self {
            app_version: config.current_version().to_string(),
            os: config.os().to_string(),
            arch: config.arch().to_string(),
            channel: config.channel().to_string(),
        }
    }
}

/// Issues update checks for one configuration.
pub struct ManifestFetcher<'a> {
    config: &'a UpdateConfig,
}

impl<'a> ManifestFetcher<'a> {
    /// Create a fetcher reading from `config`.
    pub fn new(config: &'a UpdateConfig) -> Self {
        Self { config }
    }

    /// Check for an update.
    ///
    /// Returns `Ok(None)` when the server says there is nothing to install.
    /// Returned manifests have passed signature verification; they may still
    /// name a version that is not newer than the running one.
    pub async fn check(&self) -> UpdateResult<Option<UpdateManifest>> {
        let params = CheckParams::from_config(self.config);
        debug!(
            "Checking {} for updates (version={}, os={}, arch={}, channel={})",
            self.config.url(),
            params.app_version,
            params.os,
            params.arch,
            params.channel
        );

        let response =
            self.config.http_client().post(self.config.url()).json(&params).send().await?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            debug!("Server reports no update available");
            return Ok(None);
        }
        if !status.is_success() {
            let message = response
                .text()
                .await
                .ok()
                .filter(|body| !body.trim().is_empty())
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
            return Err(UpdateError::ServerError {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await?;
        let release = Release::from_json(&body)?;

        if !release.active {
            debug!("Release {} is not active, ignoring", release.version);
            return Ok(None);
        }

        let manifest =
            release.verify(self.config.public_key(), self.config.os(), self.config.arch())?;
        info!("Update server offers version {} at {}", manifest.version, manifest.url);
        Ok(Some(manifest))
    }
}

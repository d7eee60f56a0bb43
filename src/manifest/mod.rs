//! Update manifests: the release wire format and its verified form.
//!
//! The update server answers a check with a release announcement, the same
//! JSON document the release tool publishes:
//!
//! ```json
//! {
//!   "version": "9.3.3",
//!   "active": true,
//!   "tags": { "channel": "stable" },
//!   "assets": [
//!     {
//!       "url": "https://updates.example.com/assets/app-linux-x86_64",
//!       "checksum": "<hex sha256 of the new executable>",
//!       "signature": "<hex ed25519 signature over the checksum bytes>",
//!       "tags": { "os": "linux", "arch": "x86_64" },
//!       "patch_type": "none"
//!     }
//!   ]
//! }
//! ```
//!
//! Servers that only ever serve one asset per query may flatten it: `url`,
//! `checksum`, `signature` and `tags` then sit next to `version`.
//!
//! [`Release`] is the untrusted document. [`Release::verify`] picks the asset
//! for the configured platform, checks its signature and only then produces an
//! [`UpdateManifest`], which is what the rest of the crate consumes.

pub mod signature;

use crate::core::{UpdateError, UpdateResult};
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// How an asset turns into the new executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchType {
    /// The asset is the complete new executable.
    #[default]
    #[serde(rename = "none")]
    Full,
    /// The asset is a bsdiff patch against the running executable.
    Bsdiff,
}

impl PatchType {
    /// Wire name of the patch type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "none",
            Self::Bsdiff => "bsdiff",
        }
    }
}

impl std::fmt::Display for PatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One downloadable artifact of a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    /// Where to download the asset
    pub url: String,
    /// Hex SHA-256 of the executable the asset produces
    #[serde(default)]
    pub checksum: String,
    /// Hex Ed25519 signature over the checksum bytes
    #[serde(default)]
    pub signature: String,
    /// Platform tags, typically `os` and `arch`
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// How to turn the asset into an executable
    #[serde(default)]
    pub patch_type: PatchType,
    /// Declared size of the asset in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl ReleaseAsset {
    /// Whether this asset is meant for `os`/`arch`.
    ///
    /// A missing tag matches any value.
    pub fn matches_platform(&self, os: &str, arch: &str) -> bool {
        let tag_matches = |name: &str, wanted: &str| {
            self.tags.get(name).is_none_or(|value| value.eq_ignore_ascii_case(wanted))
        };
        tag_matches("os", os) && tag_matches("arch", arch)
    }
}

fn default_active() -> bool {
    true
}

/// A release announcement as served by the update server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Version of the release
    pub version: String,
    /// Inactive releases are announced but must not be installed
    #[serde(default = "default_active")]
    pub active: bool,
    /// Release-level tags (channel) or, in the flat form, asset tags
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Assets of the release
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<ReleaseAsset>,
    /// Flat form: asset URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Flat form: asset checksum
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Flat form: asset signature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Flat form: patch type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_type: Option<PatchType>,
    /// Flat form: declared asset size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl Release {
    /// Parse a release from the response body.
    pub fn from_json(body: &[u8]) -> UpdateResult<Self> {
        let release: Self = serde_json::from_slice(body).map_err(|e| {
            UpdateError::MalformedManifest {
                message: e.to_string(),
            }
        })?;
        if release.version.trim().is_empty() {
            return Err(UpdateError::MalformedManifest {
                message: "release has no version".to_string(),
            });
        }
        Ok(release)
    }

    /// All assets, including the synthesized one of the flat form.
    pub fn assets(&self) -> Vec<ReleaseAsset> {
        if !self.assets.is_empty() {
            return self.assets.clone();
        }

        match &self.url {
            Some(url) => vec![ReleaseAsset {
                url: url.clone(),
                checksum: self.checksum.clone().unwrap_or_default(),
                signature: self.signature.clone().unwrap_or_default(),
                tags: self.tags.clone(),
                patch_type: self.patch_type.unwrap_or_default(),
                size: self.size,
            }],
            None => Vec::new(),
        }
    }

    /// First asset matching `os`/`arch`.
    pub fn asset_for(&self, os: &str, arch: &str) -> Option<ReleaseAsset> {
        self.assets().into_iter().find(|asset| asset.matches_platform(os, arch))
    }

    /// Select the platform asset and verify its signature.
    ///
    /// Nothing from the asset is returned unless the signature verifies
    /// against `key`.
    pub fn verify(&self, key: &VerifyingKey, os: &str, arch: &str) -> UpdateResult<UpdateManifest> {
        let asset = self.asset_for(os, arch).ok_or_else(|| UpdateError::NoPlatformAsset {
            platform: format!("{os}/{arch}"),
        })?;

        signature::verify_checksum_signature(key, &asset.checksum, &asset.signature)?;
        debug!("Signature verified for release {} ({})", self.version, asset.url);

        Ok(UpdateManifest {
            version: self.version.trim().to_string(),
            url: asset.url,
            checksum: Some(asset.checksum),
            content_length: asset.size,
            patch_type: asset.patch_type,
        })
    }
}

/// A verified offer to update, consumed once by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateManifest {
    /// Candidate version as announced by the server
    pub version: String,
    /// Asset or patch location
    pub url: String,
    /// Expected hex SHA-256 of the resulting executable, when known
    pub checksum: Option<String>,
    /// Declared asset size, when known
    pub content_length: Option<u64>,
    /// How to turn the asset into the new executable
    pub patch_type: PatchType,
}

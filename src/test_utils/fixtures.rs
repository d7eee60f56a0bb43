//! Fixtures for update server responses and assets.

use crate::config::UpdateConfig;
use crate::manifest::signature::sign_checksum;
use crate::manifest::{PatchType, Release, ReleaseAsset};
use crate::patch::verification::ChecksumVerifier;
use bzip2::Compression;
use bzip2::write::BzEncoder;
use ed25519_dalek::SigningKey;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

/// Seed of the key that signs test releases.
pub const TEST_KEY_SEED: [u8; 32] = [7u8; 32];

/// Platform every fixture release targets.
pub const TEST_OS: &str = "linux";
/// Architecture every fixture release targets.
pub const TEST_ARCH: &str = "x86_64";

/// The trusted test signing key.
pub fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&TEST_KEY_SEED)
}

/// Hex public half of [`signing_key`].
pub fn public_key_hex() -> String {
    hex::encode(signing_key().verifying_key().to_bytes())
}

/// Compress `data` the way mobile assets are served.
pub fn compress_bzip2(data: &[u8]) -> Vec<u8> {
    let mut encoder = BzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("writing to a Vec cannot fail");
    encoder.finish().expect("writing to a Vec cannot fail")
}

/// Config for a program at `current_version` polling `url`, trusting the
/// test key and updating `executable`.
pub fn test_config(current_version: &str, url: &str, executable: &Path) -> UpdateConfig {
    UpdateConfig::builder(current_version, url)
        .public_key(public_key_hex())
        .os(TEST_OS)
        .arch(TEST_ARCH)
        .check_interval(Duration::from_millis(50))
        .timeout(Duration::from_secs(5))
        .executable_path(executable)
        .build()
        .expect("test config is valid")
}

/// Builder for a signed release announcement.
///
/// ```rust,ignore
/// let json = ReleaseFixture::new("9.3.3", format!("{}/asset", server.uri()), b"new binary")
///     .to_json();
/// ```
#[derive(Debug, Clone)]
pub struct ReleaseFixture {
    version: String,
    url: String,
    image: Vec<u8>,
    active: bool,
    key: SigningKey,
    os: String,
    arch: String,
    checksum: Option<String>,
}

impl ReleaseFixture {
    /// A release whose asset at `url` produces `image`.
    pub fn new(version: impl Into<String>, url: impl Into<String>, image: &[u8]) -> Self {
        Self {
            version: version.into(),
            url: url.into(),
            image: image.to_vec(),
            active: true,
            key: signing_key(),
            os: TEST_OS.to_string(),
            arch: TEST_ARCH.to_string(),
            checksum: None,
        }
    }

    /// Mark the release inactive.
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Sign with a key other than the trusted one.
    pub fn signed_by(mut self, key: SigningKey) -> Self {
        self.key = key;
        self
    }

    /// Target another platform.
    pub fn platform(mut self, os: &str, arch: &str) -> Self {
        self.os = os.to_string();
        self.arch = arch.to_string();
        self
    }

    /// Announce (and sign) a checksum that does not match the image.
    pub fn wrong_checksum(mut self) -> Self {
        self.checksum = Some(ChecksumVerifier::digest(b"something else entirely"));
        self
    }

    /// The release as a typed document.
    pub fn release(&self) -> Release {
        let checksum =
            self.checksum.clone().unwrap_or_else(|| ChecksumVerifier::digest(&self.image));
        let signature = sign_checksum(&self.key, &checksum).expect("checksum is valid hex");

        let mut tags = BTreeMap::new();
        tags.insert("os".to_string(), self.os.clone());
        tags.insert("arch".to_string(), self.arch.clone());

        Release {
            version: self.version.clone(),
            active: self.active,
            tags: BTreeMap::from([("channel".to_string(), "stable".to_string())]),
            assets: vec![ReleaseAsset {
                url: self.url.clone(),
                checksum,
                signature,
                tags,
                patch_type: PatchType::Full,
                size: None,
            }],
            url: None,
            checksum: None,
            signature: None,
            patch_type: None,
            size: None,
        }
    }

    /// The release as the server would send it.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.release()).expect("release serializes")
    }
}

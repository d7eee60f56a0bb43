use crate::core::{UpdateError, UpdateResult};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

/// SHA-256 integrity checks for patched executables.
///
/// Checksums are plain lowercase hex. Expected values may carry a `sha256:`
/// prefix and any case; both are normalized before comparing.
pub struct ChecksumVerifier;

impl ChecksumVerifier {
    /// Hex SHA-256 of `contents`.
    pub fn digest(contents: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(contents);
        hex::encode(hasher.finalize())
    }

    /// Check `contents` against `expected_checksum`.
    ///
    /// # Errors
    ///
    /// [`UpdateError::ChecksumMismatch`] when the digests differ.
    pub fn verify(contents: &[u8], expected_checksum: &str) -> UpdateResult<()> {
        debug!("Verifying checksum of {} bytes", contents.len());

        let actual = Self::digest(contents);
        let expected = expected_checksum.trim().trim_start_matches("sha256:").to_lowercase();

        if actual != expected {
            return Err(UpdateError::ChecksumMismatch {
                expected: expected_checksum.to_string(),
                actual,
            });
        }

        info!("Checksum verification successful");
        Ok(())
    }
}

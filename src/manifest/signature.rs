//! Ed25519 signatures over release checksums.
//!
//! The release tool signs the raw SHA-256 digest of the new executable and
//! publishes both, hex encoded, in the asset entry. The client verifies that
//! signature with the trusted public key before it looks at any other field of
//! the asset; the checksum itself is checked again after patching, so a valid
//! signature ties the URL's content to the key holder.

use crate::core::{UpdateError, UpdateResult};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

/// Length of a raw Ed25519 public key.
pub const PUBLIC_KEY_LENGTH: usize = ed25519_dalek::PUBLIC_KEY_LENGTH;

/// Parse a trusted public key.
///
/// Accepts either the 32 raw key bytes or the key as 64 hexadecimal
/// characters (surrounding whitespace allowed, so a key file with a trailing
/// newline works).
pub fn parse_public_key(bytes: &[u8]) -> UpdateResult<VerifyingKey> {
    let invalid = |reason: String| UpdateError::InvalidPublicKey { reason };

    let raw: [u8; PUBLIC_KEY_LENGTH] = if bytes.len() == PUBLIC_KEY_LENGTH {
        bytes.try_into().map_err(|_| invalid("unexpected key length".to_string()))?
    } else {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| invalid(format!("expected {PUBLIC_KEY_LENGTH} raw bytes or hex text")))?;
        let decoded = hex::decode(text.trim()).map_err(|e| invalid(format!("bad hex: {e}")))?;
        decoded.as_slice().try_into().map_err(|_| {
            invalid(format!(
                "expected {PUBLIC_KEY_LENGTH} bytes, got {}",
                decoded.len()
            ))
        })?
    };

    VerifyingKey::from_bytes(&raw).map_err(|e| invalid(e.to_string()))
}

/// Decode a hex checksum, tolerating an optional `sha256:` prefix.
pub fn decode_checksum(checksum: &str) -> UpdateResult<Vec<u8>> {
    let hex_part = checksum.trim().trim_start_matches("sha256:");
    if hex_part.is_empty() {
        return Err(UpdateError::SignatureInvalid {
            reason: "release asset has no checksum".to_string(),
        });
    }
    hex::decode(hex_part).map_err(|e| UpdateError::SignatureInvalid {
        reason: format!("checksum is not valid hex: {e}"),
    })
}

/// Verify `signature_hex` over the bytes of `checksum_hex`.
pub fn verify_checksum_signature(
    key: &VerifyingKey,
    checksum_hex: &str,
    signature_hex: &str,
) -> UpdateResult<()> {
    let checksum = decode_checksum(checksum_hex)?;

    if signature_hex.trim().is_empty() {
        return Err(UpdateError::SignatureInvalid {
            reason: "release asset is not signed".to_string(),
        });
    }
    let raw = hex::decode(signature_hex.trim()).map_err(|e| UpdateError::SignatureInvalid {
        reason: format!("signature is not valid hex: {e}"),
    })?;
    let signature = Signature::from_slice(&raw).map_err(|e| UpdateError::SignatureInvalid {
        reason: format!("malformed signature: {e}"),
    })?;

    key.verify(&checksum, &signature).map_err(|_| UpdateError::SignatureInvalid {
        reason: "signature does not match checksum".to_string(),
    })
}

/// Sign a hex checksum, returning the hex signature.
///
/// This is the producer half of [`verify_checksum_signature`], for release
/// tooling and tests.
pub fn sign_checksum(key: &SigningKey, checksum_hex: &str) -> UpdateResult<String> {
    let checksum = decode_checksum(checksum_hex)?;
    Ok(hex::encode(key.sign(&checksum).to_bytes()))
}

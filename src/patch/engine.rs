//! The patch primitive.
//!
//! Turning an asset into a new executable image is delegated to a
//! [`PatchEngine`]. The crate ships [`FullImage`], for assets that already are
//! the complete executable; binary-diff engines (bsdiff and friends) are
//! supplied by the embedding program through
//! [`UpdateConfigBuilder::patch_engine`](crate::config::UpdateConfigBuilder::patch_engine).
//!
//! Engines run on a blocking thread and receive whole buffers: the running
//! executable and the downloaded asset.

use crate::core::{UpdateError, UpdateResult};
use crate::manifest::PatchType;

/// Produces a new executable image from the current one and an asset.
pub trait PatchEngine: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this engine understands `patch_type`.
    fn supports(&self, patch_type: PatchType) -> bool;

    /// Apply `patch` to `original`, returning the new image.
    fn apply(&self, patch_type: PatchType, original: &[u8], patch: &[u8]) -> UpdateResult<Vec<u8>>;
}

/// Engine for assets that are the complete new executable.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullImage;

impl PatchEngine for FullImage {
    fn name(&self) -> &'static str {
        "full-image"
    }

    fn supports(&self, patch_type: PatchType) -> bool {
        patch_type == PatchType::Full
    }

    fn apply(
        &self,
        patch_type: PatchType,
        _original: &[u8],
        patch: &[u8],
    ) -> UpdateResult<Vec<u8>> {
        if !self.supports(patch_type) {
            return Err(UpdateError::Patch {
                message: format!("{} engine cannot apply '{}' patches", self.name(), patch_type),
            });
        }
        if patch.is_empty() {
            return Err(UpdateError::Patch {
                message: "downloaded image is empty".to_string(),
            });
        }
        Ok(patch.to_vec())
    }
}

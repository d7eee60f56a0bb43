//! Deciding whether an offered version is newer than the running one.
//!
//! The candidate string comes from the update server and is not trusted to be
//! well formed. A candidate that cannot be parsed is treated as "not newer".
//!
//! # Examples
//!
//! ```rust
//! use autoupdate::version::{SemanticVersion, VersionComparator};
//!
//! let current = SemanticVersion::new(2, 2, 0);
//! assert!(VersionComparator::is_newer(&current, "9.3.3"));
//! assert!(!VersionComparator::is_newer(&current, "2.2.0"));
//! assert!(!VersionComparator::is_newer(&current, "not-a-version"));
//! ```

use super::SemanticVersion;
use tracing::{debug, error};

/// Version comparison for update offers.
pub struct VersionComparator;

impl VersionComparator {
    /// Returns `true` if `candidate` parses and is strictly greater than `current`.
    ///
    /// Parse failures are logged at error level and reported as `false`.
    pub fn is_newer(current: &SemanticVersion, candidate: &str) -> bool {
        match SemanticVersion::parse(candidate) {
            Ok(offered) => {
                let newer = offered > *current;
                debug!(
                    "Comparing offered version {} with current {}: newer={}",
                    offered, current, newer
                );
                newer
            }
            Err(e) => {
                error!("Bad version string on update: {}", e);
                false
            }
        }
    }
}

//! Semantic versions as used by the update protocol.
//!
//! The update server and the running program identify releases with plain
//! `MAJOR.MINOR.PATCH` strings. [`SemanticVersion`] is the parsed form; it
//! compares structurally, so `"1.10.0"` is newer than `"1.9.0"` even though it
//! sorts lower as a string.
//!
//! Parsing goes through the `semver` crate so numeric components follow the
//! semver grammar (no leading zeros, no signs), and then rejects pre-release
//! and build metadata: the protocol only knows three integers.
//!
//! The [`comparison`] submodule holds the "is this offer newer" decision the
//! poller relies on.

pub mod comparison;

pub use comparison::VersionComparator;

use crate::core::{UpdateError, UpdateResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A three-component version with total ordering.
///
/// Field order matters: the derived [`Ord`] compares `major`, then `minor`,
/// then `patch`.
///
/// # Examples
///
/// ```rust
/// use autoupdate::version::SemanticVersion;
///
/// let current = SemanticVersion::parse("2.2.0").unwrap();
/// let offered: SemanticVersion = "2.10.1".parse().unwrap();
/// assert!(offered > current);
/// assert_eq!(offered.to_string(), "2.10.1");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemanticVersion {
    /// Incompatible API changes
    pub major: u64,
    /// Backwards-compatible features
    pub minor: u64,
    /// Backwards-compatible fixes
    pub patch: u64,
}

impl SemanticVersion {
    /// Build a version from its components.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a `MAJOR.MINOR.PATCH` string.
    ///
    /// Surrounding whitespace is ignored. Anything else (a `v` prefix,
    /// missing components, pre-release tags, build metadata) is rejected with
    /// [`UpdateError::InvalidVersion`].
    pub fn parse(input: &str) -> UpdateResult<Self> {
        let trimmed = input.trim();
        let invalid = |reason: String| UpdateError::InvalidVersion {
            version: input.to_string(),
            reason,
        };

        let parsed = semver::Version::parse(trimmed).map_err(|e| invalid(e.to_string()))?;

        if !parsed.pre.is_empty() {
            return Err(invalid(format!("pre-release '{}' is not supported", parsed.pre)));
        }
        if !parsed.build.is_empty() {
            return Err(invalid(format!("build metadata '{}' is not supported", parsed.build)));
        }

        Ok(Self::new(parsed.major, parsed.minor, parsed.patch))
    }
}

impl FromStr for SemanticVersion {
    type Err = UpdateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Serialize for SemanticVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SemanticVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

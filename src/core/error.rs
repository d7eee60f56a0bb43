//! Error handling for the self-update client
//!
//! Every fallible operation in the library returns [`UpdateResult`], whose
//! error side is the single [`UpdateError`] enum. The poller does not match on
//! individual variants to decide what to do next; it asks the error to
//! classify itself through [`UpdateError::is_transient`] and
//! [`UpdateError::is_fatal`].
//!
//! # Error Categories
//!
//! - **Configuration**: [`UpdateError::ConfigError`], [`UpdateError::InvalidVersion`].
//!   Raised while building an [`UpdateConfig`](crate::config::UpdateConfig),
//!   before any polling starts.
//! - **Transport**: [`UpdateError::Network`], [`UpdateError::ServerError`],
//!   [`UpdateError::UnexpectedStatus`]. Retried by the poller on the next tick.
//! - **Verification**: [`UpdateError::SignatureInvalid`],
//!   [`UpdateError::InvalidPublicKey`], [`UpdateError::ChecksumMismatch`].
//!   The update is never applied; the poller retries on the next tick.
//! - **Apply**: [`UpdateError::Patch`], [`UpdateError::SwapFailed`] are
//!   recoverable; [`UpdateError::Unrecoverable`] is the only apply error that
//!   stops the poller.
//!
//! # Examples
//!
//! ```rust,no_run
//! use autoupdate::core::{ErrorContext, UpdateError};
//!
//! let error = UpdateError::SignatureInvalid {
//!     reason: "signature does not match checksum".to_string(),
//! };
//! assert!(error.is_transient());
//!
//! ErrorContext::new(error)
//!     .with_suggestion("Check that the configured public key matches the release key")
//!     .display();
//! ```

use colored::Colorize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for update operations.
pub type UpdateResult<T> = std::result::Result<T, UpdateError>;

/// Errors that can occur while checking for, applying, or downloading updates.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// The update configuration is unusable.
    #[error("Invalid update configuration: {message}")]
    ConfigError {
        /// What was wrong with the configuration
        message: String,
    },

    /// A version string is not of the form `MAJOR.MINOR.PATCH`.
    #[error("Invalid version string '{version}': {reason}")]
    InvalidVersion {
        /// The rejected input
        version: String,
        /// Why it was rejected
        reason: String,
    },

    /// Transport-level failure talking to the update server.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The update server answered a check with an error status.
    #[error("Update server returned error {status}: {message}")]
    ServerError {
        /// HTTP status code
        status: u16,
        /// Body or status text returned by the server
        message: String,
    },

    /// An asset download answered with anything other than `200 OK`.
    #[error("Request returned unexpected status code: expected 200 but got {status} ({reason})")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Canonical reason phrase for the status, if known
        reason: String,
    },

    /// The server response could not be decoded.
    #[error("Malformed update manifest: {message}")]
    MalformedManifest {
        /// Parser or validation message
        message: String,
    },

    /// The release does not carry an asset for this os/arch.
    #[error("No asset available for platform {platform}")]
    NoPlatformAsset {
        /// `os/arch` pair that was looked up
        platform: String,
    },

    /// The configured public key cannot be used for verification.
    #[error("Invalid public key: {reason}")]
    InvalidPublicKey {
        /// Why the key was rejected
        reason: String,
    },

    /// The manifest signature did not verify against the trusted key.
    #[error("Problem verifying signature of update: {reason}")]
    SignatureInvalid {
        /// Why verification failed
        reason: String,
    },

    /// The patched image does not hash to the checksum in the manifest.
    #[error("SHA256 verification failed: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Checksum declared by the manifest
        expected: String,
        /// Checksum of the produced image
        actual: String,
    },

    /// The patch engine could not produce a new image.
    #[error("Failed to apply patch: {message}")]
    Patch {
        /// Engine-provided description
        message: String,
    },

    /// Replacing the executable failed; the original is in place.
    #[error("Failed to swap executable {path}: {source}")]
    SwapFailed {
        /// Executable being replaced
        path: PathBuf,
        /// Underlying filesystem error
        #[source]
        source: std::io::Error,
    },

    /// The original executable could not be put back.
    ///
    /// Raised when restoring after a failed swap fails, or when an attempt
    /// starts with neither the executable nor its backup in place.
    #[error("Failed to recover {path} after a failed update: {recovery} (update error: {cause})")]
    Unrecoverable {
        /// Executable whose state is now unknown
        path: PathBuf,
        /// The failure that triggered the rollback
        cause: String,
        /// The failure of the rollback itself
        recovery: String,
    },

    /// The bzip2 container of a mobile asset is corrupt.
    #[error("Failed to decompress update: {message}")]
    Decompress {
        /// Decoder error message
        message: String,
    },

    /// Local filesystem error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation was cancelled before it started.
    #[error("Update cancelled")]
    Cancelled,
}

impl UpdateError {
    /// Whether the poller should log this error and try again on the next tick.
    pub fn is_transient(&self) -> bool {
        !self.is_fatal()
    }

    /// Whether this error must stop the self-update subsystem.
    ///
    /// Configuration errors can only happen before polling starts, but they
    /// are still fatal if they surface from a check.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Unrecoverable { .. } | Self::ConfigError { .. } | Self::InvalidPublicKey { .. }
        )
    }

    /// Whether the error is a verification failure (signature or checksum).
    pub fn is_verification_error(&self) -> bool {
        matches!(
            self,
            Self::SignatureInvalid { .. }
                | Self::InvalidPublicKey { .. }
                | Self::ChecksumMismatch { .. }
        )
    }

    /// Whether the error came from the network or the server.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::ServerError { .. } | Self::UnexpectedStatus { .. }
        )
    }

    /// HTTP status carried by the error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ServerError { status, .. } | Self::UnexpectedStatus { status, .. } => {
                Some(*status)
            }
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// An [`UpdateError`] decorated with user-facing details and a suggestion.
///
/// Used by the command-line front end to print errors the same way for every
/// subcommand.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: UpdateError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Wrap an error with no details or suggestion.
    #[must_use]
    pub const fn new(error: UpdateError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colours.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

/// Attach a suggestion appropriate for the error kind.
///
/// Errors that did not originate as [`UpdateError`] are passed through as
/// [`UpdateError::ConfigError`] with the full `anyhow` chain as the message,
/// since in the binary those only come from configuration plumbing.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let error = match error.downcast::<UpdateError>() {
        Ok(update_error) => update_error,
        Err(other) => UpdateError::ConfigError {
            message: format!("{other:#}"),
        },
    };

    match &error {
        UpdateError::InvalidVersion { .. } => ErrorContext::new(error)
            .with_suggestion("Versions must be three dot-separated numbers, e.g. 1.4.2"),
        UpdateError::InvalidPublicKey { .. } => ErrorContext::new(error).with_suggestion(
            "Provide the 32-byte Ed25519 release key as 64 hexadecimal characters",
        ),
        UpdateError::SignatureInvalid { .. } | UpdateError::ChecksumMismatch { .. } => {
            ErrorContext::new(error)
                .with_details("The update was not applied")
                .with_suggestion("Check that the configured public key matches the release key")
        }
        UpdateError::Network(_) | UpdateError::ServerError { .. } => ErrorContext::new(error)
            .with_suggestion("Check your network connection and the configured update URL"),
        UpdateError::Unrecoverable { path, .. } => {
            let details = format!(
                "The executable at {} may be missing or corrupt",
                path.display()
            );
            ErrorContext::new(error)
                .with_details(details)
                .with_suggestion("Reinstall the application before running it again")
        }
        _ => ErrorContext::new(error),
    }
}

//! Error types for artefact digests and manifest entries.
//!
//! Each variant provides a descriptive message identifying the invalid input
//! and the constraint that was violated.

use thiserror::Error;

/// Errors arising from invalid artefact-related values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArtefactError {
    /// A SHA-256 digest is not a valid 64-character hex string.
    #[error("invalid SHA-256 digest: {reason}")]
    InvalidSha256Digest {
        /// Description of the validation failure.
        reason: String,
    },

    /// A manifest entry path is empty or does not name a file.
    #[error("invalid manifest path \"{value}\": {reason}")]
    InvalidManifestPath {
        /// The rejected relative path.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },
}

/// Result type alias using [`ArtefactError`].
pub type Result<T> = std::result::Result<T, ArtefactError>;

//! SHA-256 digest newtype for artefact verification.
//!
//! Validates that the value is a 64-character lowercase hexadecimal string
//! representing a 256-bit hash digest.

use super::error::{ArtefactError, Result};
use std::fmt;

/// Expected length of a hex-encoded SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// A validated hex-encoded SHA-256 digest string.
///
/// Comparison is exact string equality; the lowercase invariant means two
/// digests of the same bytes always compare equal.
///
/// # Examples
///
/// ```
/// use pipstrap::artefact::sha256_digest::Sha256Digest;
///
/// let hex = "a".repeat(64);
/// let digest = Sha256Digest::try_from(hex.as_str())?;
/// assert_eq!(digest.as_str().len(), 64);
/// # Ok::<(), pipstrap::artefact::error::ArtefactError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Return the digest as a hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap hex produced by a hasher, which is well-formed by construction.
    pub(crate) fn from_hasher_output(hex: String) -> Self {
        debug_assert!(validate_sha256(&hex).is_ok());
        Self(hex)
    }
}

impl TryFrom<&str> for Sha256Digest {
    type Error = ArtefactError;

    fn try_from(value: &str) -> Result<Self> {
        validate_sha256(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for Sha256Digest {
    type Error = ArtefactError;

    fn try_from(value: String) -> Result<Self> {
        validate_sha256(&value)?;
        Ok(Self(value))
    }
}

impl AsRef<str> for Sha256Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validate that `value` is a well-formed hex-encoded SHA-256 digest.
fn validate_sha256(value: &str) -> Result<()> {
    if value.len() != DIGEST_HEX_LEN {
        return Err(ArtefactError::InvalidSha256Digest {
            reason: format!(
                "expected {DIGEST_HEX_LEN} hex characters, got {}",
                value.len()
            ),
        });
    }
    if let Some(bad) = value.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(ArtefactError::InvalidSha256Digest {
            reason: format!("non-hex character '{bad}'"),
        });
    }
    if value.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(ArtefactError::InvalidSha256Digest {
            reason: "digest must be lowercase".to_owned(),
        });
    }
    Ok(())
}

//! Streaming digest verification for downloaded artefacts.
//!
//! The digest is computed chunk by chunk as bytes arrive, so payloads are
//! never buffered in memory. A mismatch is reported with enough detail for
//! forensic inspection, and the offending file is left where it was written.

use camino::{Utf8Path, Utf8PathBuf};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Read};

use super::sha256_digest::Sha256Digest;

/// Size of the buffer used when hashing and streaming artefacts.
pub const CHUNK_SIZE: usize = 4096;

/// Incremental SHA-256 state fed with each downloaded chunk.
///
/// # Examples
///
/// ```
/// use pipstrap::artefact::verification::StreamingDigest;
///
/// let mut digest = StreamingDigest::new();
/// digest.update(b"hello ");
/// digest.update(b"world");
/// assert_eq!(
///     digest.finalize().as_str(),
///     "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
/// );
/// ```
#[derive(Clone)]
pub struct StreamingDigest {
    hasher: Sha256,
    bytes: u64,
}

impl StreamingDigest {
    /// Start a fresh digest.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
            bytes: 0,
        }
    }

    /// Feed one chunk into the digest.
    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.bytes += chunk.len() as u64;
    }

    /// Number of bytes hashed so far.
    #[must_use]
    pub fn bytes_hashed(&self) -> u64 {
        self.bytes
    }

    /// Finish hashing and return the lowercase hex digest.
    #[must_use]
    pub fn finalize(self) -> Sha256Digest {
        Sha256Digest::from_hasher_output(format!("{:x}", self.hasher.finalize()))
    }
}

impl Default for StreamingDigest {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StreamingDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingDigest")
            .field("bytes", &self.bytes)
            .finish_non_exhaustive()
    }
}

/// A downloaded file whose content matched its pinned digest.
///
/// Values are only produced by [`verify_digest`], so holding one is proof
/// that the downloaded bytes were checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedArtefact {
    path: Utf8PathBuf,
    digest: Sha256Digest,
}

impl VerifiedArtefact {
    /// Location of the verified file inside the workspace.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// The digest the file was verified against.
    #[must_use]
    pub fn digest(&self) -> &Sha256Digest {
        &self.digest
    }
}

/// Downloaded bytes did not hash to the pinned digest.
///
/// This is a tamper signal rather than a transient fault: callers must not
/// retry against another source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "{url} did not match the expected hash {expected}. Instead, it was {actual}. \
     The file (left at {path}) may have been tampered with."
)]
pub struct HashMismatch {
    /// The URL the artefact was fetched from.
    pub url: String,
    /// Where the mismatching file was left on disk.
    pub path: Utf8PathBuf,
    /// The digest of the bytes actually received.
    pub actual: Sha256Digest,
    /// The pinned digest from the manifest.
    pub expected: Sha256Digest,
}

/// Compare a computed digest with the expected one.
///
/// # Errors
///
/// Returns [`HashMismatch`] when the digests differ. The file at `path` is
/// not touched.
pub fn verify_digest(
    url: &str,
    path: &Utf8Path,
    actual: Sha256Digest,
    expected: &Sha256Digest,
) -> Result<VerifiedArtefact, HashMismatch> {
    if actual.as_str() != expected.as_str() {
        return Err(HashMismatch {
            url: url.to_owned(),
            path: path.to_owned(),
            actual,
            expected: expected.clone(),
        });
    }
    Ok(VerifiedArtefact {
        path: path.to_owned(),
        digest: actual,
    })
}

/// Compute the SHA-256 digest of a file by streaming it.
///
/// Used to re-hash a retained file after a mismatch.
///
/// # Errors
///
/// Returns any I/O error raised while opening or reading the file.
pub fn sha256_file(path: &Utf8Path) -> io::Result<Sha256Digest> {
    let mut file = fs::File::open(path)?;
    let mut digest = StreamingDigest::new();
    let mut buffer = [0u8; CHUNK_SIZE];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        digest.update(buffer.get(..bytes_read).unwrap_or_default());
    }
    Ok(digest.finalize())
}

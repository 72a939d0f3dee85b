//! Pinned artefact manifest.
//!
//! The manifest is the list of archives that together make up the known-good
//! pip installation, each paired with the SHA-256 digest it must hash to.
//! It is compiled into the binary; the only variation is an extra `argparse`
//! archive required by runtimes that predate its inclusion in the standard
//! library, selected through [`RuntimeCapability`].

use super::error::{ArtefactError, Result};
use super::sha256_digest::Sha256Digest;

/// The pip release this manifest installs.
pub const PIP_VERSION: &str = "8.0.3";

/// Pinned `(relative path, digest)` pairs for every runtime.
const CORE_ARTEFACTS: &[(&str, &str)] = &[
    // pip vendors all of its dependencies.
    (
        "22/f3/14bc87a4f6b5ec70b682765978a6f3105bf05b6781fa97e04d30138bd264/pip-8.0.3.tar.gz",
        "30f98b66f3fe1069c529a491597d34a1c224a68640c82caf2ade5f88aa1405e8",
    ),
    // This setuptools release has only optional dependencies.
    (
        "69/65/4c544cde88d4d876cdf5cbc5f3f15d02646477756d89547e9a7ecd6afa76/setuptools-20.2.2.tar.gz",
        "24fcfc15364a9fe09a220f37d2dcedc849795e3de3e4b393ee988e66a9cbd85a",
    ),
    (
        "c9/1d/bd19e691fd4cfe908c76c429fe6e4436c9e83583c4414b54f6c85471954a/wheel-0.29.0.tar.gz",
        "1ebb8ad7e26b448e9caa4773d2357849bf80ff9e313964bcaf79cbf0201a1648",
    ),
];

/// wheel depends on argparse, which runtimes before 2.7 do not ship.
const ARGPARSE_ARTEFACT: (&str, &str) = (
    "18/dd/e617cfc3f6210ae183374cd9f6a26b20514bbb5a792af97949c5aacddf0f/argparse-1.4.0.tar.gz",
    "62b089a55be1d8949cd2bc7e0df0bddb9e028faefc8c32038cc84862aefdd6e4",
);

/// What the target Python runtime provides out of the box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RuntimeCapability {
    /// The runtime ships `argparse` (Python 2.7 and later).
    #[default]
    Modern,
    /// The runtime predates `argparse` and needs it installed alongside wheel.
    Legacy,
}

impl RuntimeCapability {
    /// Classify a Python `major.minor` runtime version.
    ///
    /// # Examples
    ///
    /// ```
    /// use pipstrap::artefact::manifest::RuntimeCapability;
    ///
    /// assert_eq!(RuntimeCapability::for_python(2, 6), RuntimeCapability::Legacy);
    /// assert_eq!(RuntimeCapability::for_python(2, 7), RuntimeCapability::Modern);
    /// assert_eq!(RuntimeCapability::for_python(3, 4), RuntimeCapability::Modern);
    /// ```
    #[must_use]
    pub fn for_python(major: u32, minor: u32) -> Self {
        if (major, minor) < (2, 7) {
            Self::Legacy
        } else {
            Self::Modern
        }
    }
}

/// One pinned archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    relative_path: String,
    digest: Sha256Digest,
}

impl ManifestEntry {
    /// Create an entry, validating the path and digest.
    ///
    /// # Errors
    ///
    /// Returns [`ArtefactError::InvalidManifestPath`] if the path is empty,
    /// absolute, or ends in `/`, and [`ArtefactError::InvalidSha256Digest`]
    /// if the digest is malformed.
    pub fn new(relative_path: &str, digest: &str) -> Result<Self> {
        validate_relative_path(relative_path)?;
        Ok(Self {
            relative_path: relative_path.to_owned(),
            digest: Sha256Digest::try_from(digest)?,
        })
    }

    /// Path of the archive below `{base}/packages/`.
    #[must_use]
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// The digest the archive must hash to.
    #[must_use]
    pub fn digest(&self) -> &Sha256Digest {
        &self.digest
    }

    /// The archive's file name, i.e. the final path segment.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }
}

/// An ordered, immutable list of pinned archives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Build a manifest from explicit entries, preserving their order.
    #[must_use]
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    /// The manifest compiled into this binary for the given runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if a compiled-in entry is malformed.
    ///
    /// # Examples
    ///
    /// ```
    /// use pipstrap::artefact::manifest::{Manifest, RuntimeCapability};
    ///
    /// let modern = Manifest::pinned(RuntimeCapability::Modern)?;
    /// let legacy = Manifest::pinned(RuntimeCapability::Legacy)?;
    /// assert_eq!(modern.len() + 1, legacy.len());
    /// # Ok::<(), pipstrap::artefact::error::ArtefactError>(())
    /// ```
    pub fn pinned(capability: RuntimeCapability) -> Result<Self> {
        let extra = match capability {
            RuntimeCapability::Legacy => Some(&ARGPARSE_ARTEFACT),
            RuntimeCapability::Modern => None,
        };
        let entries = extra
            .into_iter()
            .chain(CORE_ARTEFACTS)
            .map(|(path, digest)| ManifestEntry::new(path, digest))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// Entries in installation order.
    #[must_use]
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Number of pinned archives.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest pins nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn validate_relative_path(value: &str) -> Result<()> {
    let reason = if value.is_empty() {
        "path is empty"
    } else if value.starts_with('/') {
        "path must be relative to the packages directory"
    } else if value.ends_with('/') {
        "path does not name a file"
    } else if value.split('/').any(|segment| segment == "..") {
        "path must not contain parent directory segments"
    } else {
        return Ok(());
    };
    Err(ArtefactError::InvalidManifestPath {
        value: value.to_owned(),
        reason: reason.to_owned(),
    })
}

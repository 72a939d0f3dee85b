//! Mirror-failover download orchestration.
//!
//! Every manifest entry must be fetched and verified from the same base in a
//! single pass; a network failure abandons the whole base and moves to the
//! next one, so artefacts from different sources are never mixed. A digest
//! mismatch is a tamper signal and stops everything immediately.

use camino::Utf8Path;
use log::{debug, info, warn};

use crate::artefact::download::{ArtefactFetcher, FetchError, NetworkError};
use crate::artefact::manifest::Manifest;
use crate::artefact::verification::{HashMismatch, VerifiedArtefact};
use crate::mirrors::{MirrorList, artefact_url};

/// Errors that end a download run.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// An artefact failed digest verification.
    #[error(transparent)]
    Tampered(#[from] HashMismatch),

    /// Every mirror failed with a network error.
    #[error(
        "could not download the pinned archives from any of {} mirror(s) ({}); last error: {last}",
        .attempted.len(),
        .attempted.join(", ")
    )]
    MirrorsExhausted {
        /// Bases tried, in order.
        attempted: Vec<String>,
        /// The error that ended the final attempt.
        last: NetworkError,
    },

    /// A download could not be written locally.
    #[error("I/O error writing download to {path}: {source}")]
    Io {
        /// The file being written.
        path: camino::Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Downloads a manifest from the first mirror that can serve all of it.
///
/// The manifest, mirror list and fetcher are injected so the failover policy
/// can be exercised with fakes.
pub struct DownloadOrchestrator<'a> {
    manifest: &'a Manifest,
    mirrors: &'a MirrorList,
    fetcher: &'a dyn ArtefactFetcher,
}

impl<'a> DownloadOrchestrator<'a> {
    /// Create an orchestrator over the given inputs.
    #[must_use]
    pub fn new(
        manifest: &'a Manifest,
        mirrors: &'a MirrorList,
        fetcher: &'a dyn ArtefactFetcher,
    ) -> Self {
        Self {
            manifest,
            mirrors,
            fetcher,
        }
    }

    /// Fetch and verify every manifest entry into `dest_dir`.
    ///
    /// Returns the verified artefacts in manifest order, all from one base.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Tampered`] on the first digest mismatch,
    /// [`DownloadError::Io`] on a local write failure, and
    /// [`DownloadError::MirrorsExhausted`] when every base failed.
    pub fn download_all(
        &self,
        dest_dir: &Utf8Path,
    ) -> Result<Vec<VerifiedArtefact>, DownloadError> {
        let mut attempted = Vec::with_capacity(self.mirrors.len());
        let mut last_error = None;

        for base in self.mirrors.bases() {
            attempted.push(base.clone());
            match self.download_from(base, dest_dir) {
                Ok(artefacts) => {
                    info!("downloaded {} archive(s) from {base}", artefacts.len());
                    return Ok(artefacts);
                }
                Err(FetchError::Network(err)) => {
                    warn!("mirror {base} failed: {err}");
                    last_error = Some(err);
                }
                Err(FetchError::HashMismatch(mismatch)) => {
                    return Err(DownloadError::Tampered(mismatch));
                }
                Err(FetchError::Io { path, source }) => {
                    return Err(DownloadError::Io { path, source });
                }
            }
        }

        let last = last_error.unwrap_or_else(|| NetworkError::Transfer {
            url: String::new(),
            reason: "no mirrors configured".to_owned(),
        });
        Err(DownloadError::MirrorsExhausted { attempted, last })
    }

    /// One pass over the manifest against a single base.
    fn download_from(
        &self,
        base: &str,
        dest_dir: &Utf8Path,
    ) -> Result<Vec<VerifiedArtefact>, FetchError> {
        debug!("trying mirror {base}");
        self.manifest
            .entries()
            .iter()
            .map(|entry| {
                let url = artefact_url(base, entry.relative_path());
                debug!("fetching {} from {base}", entry.file_name());
                self.fetcher.fetch(&url, dest_dir, entry.digest())
            })
            .collect()
    }
}

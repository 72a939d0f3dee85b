//! Hash-authenticated artefact fetching.
//!
//! Provides a trait-based abstraction for downloading one archive into the
//! workspace, enabling dependency injection for testing. The HTTP
//! implementation streams the body in fixed-size chunks, hashing each chunk
//! as it is written so the digest is known as soon as the transfer ends.

use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::fs::File;
use std::io::{self, Read, Write};
use std::sync::OnceLock;
use std::time::Duration;

use super::sha256_digest::Sha256Digest;
use super::verification::{CHUNK_SIZE, HashMismatch, StreamingDigest, VerifiedArtefact, verify_digest};

/// Network timeout for a single artefact download.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_mins(1);

/// Trait for fetching one pinned artefact.
///
/// Abstractions allow tests to fake HTTP behaviour without network access.
#[cfg_attr(test, mockall::automock)]
pub trait ArtefactFetcher {
    /// Download `url` into `dest_dir` and verify it against `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Network`] for transient source failures,
    /// [`FetchError::HashMismatch`] when the bytes do not match, and
    /// [`FetchError::Io`] when the local file cannot be written.
    fn fetch(
        &self,
        url: &str,
        dest_dir: &Utf8Path,
        expected: &Sha256Digest,
    ) -> Result<VerifiedArtefact, FetchError>;
}

/// Transient, source-level failures.
///
/// These are recovered by moving on to the next mirror.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// The host name could not be resolved.
    #[error("could not resolve host for {url}")]
    Dns {
        /// The URL that was requested.
        url: String,
    },

    /// The server refused or dropped the connection.
    #[error("connection to {url} failed: {reason}")]
    ConnectionRefused {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP status {status}")]
    HttpStatus {
        /// The URL that was requested.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The transfer did not complete in time.
    #[error("timed out fetching {url}")]
    Timeout {
        /// The URL that was requested.
        url: String,
    },

    /// The URL could not be used to name a download.
    #[error("invalid artefact URL {url}: {reason}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Description of the problem.
        reason: String,
    },

    /// Any other transfer failure, including a body that stopped mid-stream.
    #[error("download failed for {url}: {reason}")]
    Transfer {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },
}

/// Errors arising from a single fetch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The source could not deliver the artefact; try another mirror.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// The artefact arrived but failed verification.
    #[error(transparent)]
    HashMismatch(#[from] HashMismatch),

    /// The download could not be written locally.
    #[error("I/O error writing download to {path}: {source}")]
    Io {
        /// The file being written.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// HTTP-based fetcher using `ureq`.
///
/// # Examples
///
/// ```no_run
/// use camino::Utf8Path;
/// use pipstrap::artefact::download::{ArtefactFetcher, HttpFetcher};
/// use pipstrap::artefact::sha256_digest::Sha256Digest;
///
/// let expected = Sha256Digest::try_from(
///     "30f98b66f3fe1069c529a491597d34a1c224a68640c82caf2ade5f88aa1405e8",
/// )?;
/// let artefact = HttpFetcher.fetch(
///     "https://pypi.python.org/packages/22/f3/14bc87a4f6b5ec70b682765978a6f3105bf05b6781fa97e04d30138bd264/pip-8.0.3.tar.gz",
///     Utf8Path::new("/tmp"),
///     &expected,
/// )?;
/// println!("verified {}", artefact.path());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpFetcher;

impl ArtefactFetcher for HttpFetcher {
    fn fetch(
        &self,
        url: &str,
        dest_dir: &Utf8Path,
        expected: &Sha256Digest,
    ) -> Result<VerifiedArtefact, FetchError> {
        let dest = dest_dir.join(download_file_name(url)?);
        debug!("fetching {url} to {dest}");

        let response = agent_for(url)
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let mut body = response.into_body();
        let actual = stream_to_file(url, &mut body.as_reader(), &dest)?;

        Ok(verify_digest(url, &dest, actual, expected)?)
    }
}

/// Derive the local file name from the URL's final path segment.
///
/// # Errors
///
/// Returns [`NetworkError::InvalidUrl`] if the URL cannot be parsed or its
/// path has no final segment.
///
/// # Examples
///
/// ```
/// use pipstrap::artefact::download::download_file_name;
///
/// let name = download_file_name("https://good.example/packages/ab/cd/pkgA-1.0.tar.gz?x=1")?;
/// assert_eq!(name, "pkgA-1.0.tar.gz");
/// # Ok::<(), pipstrap::artefact::download::NetworkError>(())
/// ```
pub fn download_file_name(url: &str) -> Result<String, NetworkError> {
    let uri = url
        .parse::<ureq::http::Uri>()
        .map_err(|e| NetworkError::InvalidUrl {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;
    match uri.path().rsplit('/').next() {
        Some(name) if !name.is_empty() && name != "." && name != ".." => Ok(name.to_owned()),
        _ => Err(NetworkError::InvalidUrl {
            url: url.to_owned(),
            reason: "path has no file name".to_owned(),
        }),
    }
}

/// Copy `reader` into `dest` chunk by chunk, hashing as it goes.
///
/// Read failures are attributed to the source; write failures are local.
fn stream_to_file(
    url: &str,
    reader: &mut dyn Read,
    dest: &Utf8Path,
) -> Result<Sha256Digest, FetchError> {
    let local_error = |source| FetchError::Io {
        path: dest.to_owned(),
        source,
    };
    let mut file = File::create(dest).map_err(local_error)?;
    let mut digest = StreamingDigest::new();
    let mut buffer = [0u8; CHUNK_SIZE];
    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(map_read_error(url, &e).into()),
        };
        let chunk = buffer.get(..bytes_read).unwrap_or_default();
        file.write_all(chunk).map_err(local_error)?;
        digest.update(chunk);
    }
    file.flush().map_err(local_error)?;
    debug!("received {} bytes from {url}", digest.bytes_hashed());
    Ok(digest.finalize())
}

/// Pick the agent for a URL's scheme.
///
/// HTTPS downloads must never be downgraded, so their agent refuses any
/// plaintext hop including redirects to `http://`. Explicit `http://`
/// mirrors are allowed and rely on the digest check alone.
fn agent_for(url: &str) -> &'static ureq::Agent {
    static HTTPS_ONLY: OnceLock<ureq::Agent> = OnceLock::new();
    static PLAIN: OnceLock<ureq::Agent> = OnceLock::new();

    let https_only = is_https(url);
    let cell = if https_only { &HTTPS_ONLY } else { &PLAIN };
    cell.get_or_init(|| {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(DOWNLOAD_TIMEOUT))
            .https_only(https_only)
            .build();
        ureq::Agent::new_with_config(config)
    })
}

fn is_https(url: &str) -> bool {
    url.get(..8)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("https://"))
}

/// Map a ureq error to a [`NetworkError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> NetworkError {
    let url = url.to_owned();
    match err {
        ureq::Error::StatusCode(status) => NetworkError::HttpStatus {
            url,
            status: *status,
        },
        ureq::Error::HostNotFound => NetworkError::Dns { url },
        ureq::Error::Timeout(_) => NetworkError::Timeout { url },
        ureq::Error::ConnectionFailed => NetworkError::ConnectionRefused {
            url,
            reason: err.to_string(),
        },
        ureq::Error::Io(io_err) => map_read_error(&url, io_err),
        other => NetworkError::Transfer {
            url,
            reason: other.to_string(),
        },
    }
}

fn map_read_error(url: &str, err: &io::Error) -> NetworkError {
    let url = url.to_owned();
    match err.kind() {
        io::ErrorKind::TimedOut => NetworkError::Timeout { url },
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted => NetworkError::ConnectionRefused {
            url,
            reason: err.to_string(),
        },
        _ => NetworkError::Transfer {
            url,
            reason: err.to_string(),
        },
    }
}

//! Shared test utilities for the pipstrap crate.

use crate::artefact::download::{ArtefactFetcher, FetchError, NetworkError, download_file_name};
use crate::artefact::sha256_digest::Sha256Digest;
use crate::artefact::verification::{StreamingDigest, VerifiedArtefact, verify_digest};
use crate::error::{BootstrapError, Result};
use crate::pip::CommandExecutor;
use crate::workspace::WORKSPACE_PREFIX;
use camino::{Utf8Path, Utf8PathBuf};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// Creates a successful command `Output` with the given stdout.
#[must_use]
pub fn success_output(stdout: &str) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// A `pip --version` banner for the given pip and Python versions.
#[must_use]
pub fn version_output(pip: &str, python: &str) -> String {
    format!("pip {pip} from /usr/lib/python{python}/site-packages (python {python})\n")
}

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_of(bytes: &[u8]) -> Sha256Digest {
    let mut digest = StreamingDigest::new();
    digest.update(bytes);
    digest.finalize()
}

/// Every leftover workspace directory directly below `parent`.
#[must_use]
pub fn leftover_workspaces(parent: &Utf8Path) -> Vec<Utf8PathBuf> {
    let Ok(entries) = parent.read_dir_utf8() else {
        return Vec::new();
    };
    entries
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_name().starts_with(WORKSPACE_PREFIX))
        .map(|entry| entry.path().to_owned())
        .collect()
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The program to execute (e.g., "pip").
    pub program: &'static str,
    /// Leading arguments the invocation must start with.
    pub args: Vec<String>,
    /// The result to return when this command is invoked.
    pub result: Result<Output>,
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Records expected command invocations and returns predefined results,
/// allowing tests to verify command execution without side effects. An
/// unexpected invocation is reported as [`BootstrapError::StubMismatch`].
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
    received: RefCell<Vec<Vec<String>>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
            received: RefCell::new(Vec::new()),
        }
    }

    /// Arguments of every invocation received so far.
    #[must_use]
    pub fn received(&self) -> Vec<Vec<String>> {
        self.received.borrow().clone()
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "expected no further command invocations"
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, program: &str, args: &[String]) -> Result<Output> {
        self.received.borrow_mut().push(args.to_vec());
        let call = self.expected.borrow_mut().pop_front().ok_or_else(|| {
            BootstrapError::StubMismatch {
                message: format!("unexpected invocation: {program} {args:?}"),
            }
        })?;

        if call.program != program || !args.starts_with(&call.args) {
            return Err(BootstrapError::StubMismatch {
                message: format!(
                    "expected {} {:?}, got {program} {args:?}",
                    call.program, call.args
                ),
            });
        }

        call.result
    }
}

/// How a [`StubFetcher`] mirror responds.
#[derive(Debug, Clone)]
pub enum MirrorBehaviour {
    /// Serve files by name; missing names answer HTTP 404.
    Serve(HashMap<String, Vec<u8>>),
    /// Refuse every connection.
    Refuse,
}

/// An in-memory [`ArtefactFetcher`] keyed by mirror base.
///
/// Served bytes are written into the destination directory and verified
/// with the real digest check, so files are left on disk exactly as the
/// HTTP fetcher would leave them. Bases with no configured behaviour fail
/// name resolution.
#[derive(Debug, Default)]
pub struct StubFetcher {
    mirrors: Vec<(String, MirrorBehaviour)>,
    requests: RefCell<Vec<String>>,
}

impl StubFetcher {
    /// Creates a fetcher with no reachable mirrors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `files` (name, bytes) from `base`.
    #[must_use]
    pub fn serve<I, N>(mut self, base: &str, files: I) -> Self
    where
        I: IntoIterator<Item = (N, Vec<u8>)>,
        N: Into<String>,
    {
        let files = files.into_iter().map(|(n, b)| (n.into(), b)).collect();
        self.mirrors
            .push((base.to_owned(), MirrorBehaviour::Serve(files)));
        self
    }

    /// Refuse connections to `base`.
    #[must_use]
    pub fn refuse(mut self, base: &str) -> Self {
        self.mirrors.push((base.to_owned(), MirrorBehaviour::Refuse));
        self
    }

    /// Every URL requested so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    fn behaviour_for(&self, url: &str) -> Option<&MirrorBehaviour> {
        self.mirrors
            .iter()
            .find(|(base, _)| url.starts_with(&format!("{base}/")))
            .map(|(_, behaviour)| behaviour)
    }
}

impl ArtefactFetcher for StubFetcher {
    fn fetch(
        &self,
        url: &str,
        dest_dir: &Utf8Path,
        expected: &Sha256Digest,
    ) -> std::result::Result<VerifiedArtefact, FetchError> {
        self.requests.borrow_mut().push(url.to_owned());
        let name = download_file_name(url)?;
        let files = match self.behaviour_for(url) {
            None => {
                return Err(NetworkError::Dns {
                    url: url.to_owned(),
                }
                .into());
            }
            Some(MirrorBehaviour::Refuse) => {
                return Err(NetworkError::ConnectionRefused {
                    url: url.to_owned(),
                    reason: "connection refused".to_owned(),
                }
                .into());
            }
            Some(MirrorBehaviour::Serve(files)) => files,
        };
        let bytes = files.get(&name).ok_or_else(|| NetworkError::HttpStatus {
            url: url.to_owned(),
            status: 404,
        })?;

        let path = dest_dir.join(&name);
        std::fs::write(&path, bytes).map_err(|source| FetchError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(verify_digest(url, &path, sha256_of(bytes), expected)?)
    }
}

//! Error types for the bootstrapper.
//!
//! Digest mismatches are deliberately absent: they are a tamper signal and
//! are reported through [`crate::bootstrap::Outcome::Tampered`] rather than
//! as a propagated failure. Everything here is fatal and is surfaced at the
//! process boundary after the workspace has been removed.

use crate::artefact::error::ArtefactError;
use crate::orchestrator::DownloadError;
use thiserror::Error;

/// Errors that can occur while bootstrapping pip.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The installed pip could not be queried for its version.
    #[error("failed to query {program} version: {reason}")]
    VersionQuery {
        /// The pip executable that was run.
        program: String,
        /// Description of the failure.
        reason: String,
    },

    /// The version output could not be understood.
    #[error("could not parse pip version from \"{output}\": {reason}")]
    VersionParse {
        /// The raw `--version` output.
        output: String,
        /// Description of the parse failure.
        reason: String,
    },

    /// A compiled-in manifest entry is malformed.
    #[error("invalid pinned manifest: {0}")]
    Manifest(#[from] ArtefactError),

    /// The temporary workspace could not be created.
    #[error("failed to create temporary workspace: {source}")]
    Workspace {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Downloading the pinned archives failed for a reason other than
    /// tampering.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// `pip install` exited unsuccessfully.
    #[error("`{command}` failed with {}: {}", describe_exit(*.code), .stderr.trim())]
    InstallerFailure {
        /// The command line that was run, with each path shell-quoted.
        command: String,
        /// The exit code, if the process exited normally.
        code: Option<i32>,
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

fn describe_exit(code: Option<i32>) -> String {
    code.map_or_else(
        || "no exit status (terminated by signal)".to_owned(),
        |code| format!("exit status {code}"),
    )
}

/// Result type alias using [`BootstrapError`].
pub type Result<T> = std::result::Result<T, BootstrapError>;

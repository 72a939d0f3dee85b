//! User-facing messages and exit codes.
//!
//! Everything the binary prints goes to stderr through
//! [`write_stderr_line`]; structured logging is separate and controlled by
//! `RUST_LOG`.

use camino::Utf8Path;
use std::fmt::Display;
use std::io::Write;

use crate::artefact::sha256_digest::Sha256Digest;
use crate::artefact::verification::HashMismatch;
use crate::bootstrap::Outcome;
use crate::error::Result;

/// pip already met the target or was upgraded.
pub const EXIT_SUCCESS: i32 = 0;

/// A downloaded archive failed digest verification.
pub const EXIT_TAMPERED: i32 = 1;

/// Any other failure.
pub const EXIT_FAILURE: i32 = 2;

/// The diagnostic printed when an archive fails verification.
///
/// # Example
///
/// ```
/// use camino::{Utf8Path, Utf8PathBuf};
/// use pipstrap::artefact::sha256_digest::Sha256Digest;
/// use pipstrap::artefact::verification::HashMismatch;
/// use pipstrap::output::tamper_message;
///
/// let mismatch = HashMismatch {
///     url: "https://good.example/packages/pkgA-1.0.tar.gz".to_owned(),
///     path: Utf8PathBuf::from("/tmp/pipstrap-x/pkgA-1.0.tar.gz"),
///     actual: Sha256Digest::try_from("f".repeat(64))?,
///     expected: Sha256Digest::try_from("a".repeat(64))?,
/// };
/// let message = tamper_message(&mismatch, Utf8Path::new("/tmp/pipstrap-x"));
/// assert!(message.contains(&"a".repeat(64)));
/// assert!(message.contains(&"f".repeat(64)));
/// # Ok::<(), pipstrap::artefact::error::ArtefactError>(())
/// ```
#[must_use]
pub fn tamper_message(mismatch: &HashMismatch, workspace: &Utf8Path) -> String {
    format!(
        concat!(
            "Hashes don't match: {mismatch}\n\n",
            "Nothing was installed. The downloaded files were kept in {workspace} ",
            "for inspection."
        ),
        mismatch = mismatch,
        workspace = workspace
    )
}

/// Extra line for a kept file that no longer matches what was downloaded.
fn rehash_note(mismatch: &HashMismatch, on_disk: Option<&Sha256Digest>) -> Option<String> {
    match on_disk {
        None => Some(format!("The kept file {} could not be re-read.", mismatch.path)),
        Some(digest) if *digest != mismatch.actual => Some(format!(
            "The kept file {} changed after download; it now hashes to {digest}.",
            mismatch.path
        )),
        Some(_) => None,
    }
}

/// Format the message for a successful run.
#[must_use]
pub fn outcome_message(outcome: &Outcome) -> Option<String> {
    match outcome {
        Outcome::Satisfied { current } => Some(format!(
            "pip {current} is already installed; nothing to do."
        )),
        Outcome::Upgraded { from, to } => Some(format!("Upgraded pip from {from} to {to}.")),
        Outcome::Tampered { .. } => None,
    }
}

/// Print the result of a bootstrap run and return the process exit code.
///
/// Failures and the tamper diagnostic are always printed; the success
/// message is suppressed by `quiet`.
pub fn report(result: Result<Outcome>, quiet: bool, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(Outcome::Tampered {
            mismatch,
            workspace,
            on_disk,
        }) => {
            write_stderr_line(stderr, tamper_message(&mismatch, &workspace));
            if let Some(note) = rehash_note(&mismatch, on_disk.as_ref()) {
                write_stderr_line(stderr, note);
            }
            EXIT_TAMPERED
        }
        Ok(outcome) => {
            if let Some(message) = outcome_message(&outcome).filter(|_| !quiet) {
                write_stderr_line(stderr, message);
            }
            EXIT_SUCCESS
        }
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            EXIT_FAILURE
        }
    }
}

/// Write one line to stderr, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort output; ignore write failures.
    }
}

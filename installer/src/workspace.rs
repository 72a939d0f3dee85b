//! Temporary download workspace.
//!
//! A workspace is created fresh for each bootstrap attempt and ends in
//! exactly one of two ways: [`Workspace::remove`] deletes it, and
//! [`Workspace::retain`] keeps it on disk for inspection after a tamper
//! signal. A workspace dropped without either (for example during a panic)
//! is removed.

use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::io;
use tempfile::TempDir;

/// Prefix given to workspace directory names.
pub const WORKSPACE_PREFIX: &str = "pipstrap-";

/// An exclusively-owned temporary directory for one attempt's downloads.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    path: Utf8PathBuf,
}

impl Workspace {
    /// Create a workspace in the system temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or its path is not
    /// valid UTF-8.
    pub fn create() -> io::Result<Self> {
        Self::from_temp_dir(tempfile::Builder::new().prefix(WORKSPACE_PREFIX).tempdir()?)
    }

    /// Create a workspace below `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn create_in(parent: &Utf8Path) -> io::Result<Self> {
        Self::from_temp_dir(
            tempfile::Builder::new()
                .prefix(WORKSPACE_PREFIX)
                .tempdir_in(parent)?,
        )
    }

    fn from_temp_dir(dir: TempDir) -> io::Result<Self> {
        let path = Utf8PathBuf::try_from(dir.path().to_path_buf())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        debug!("created workspace {path}");
        Ok(Self { dir, path })
    }

    /// The workspace directory.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Keep the directory on disk and return its location.
    #[must_use = "the retained path is the only record of where the files were left"]
    pub fn retain(self) -> Utf8PathBuf {
        let Self { dir, path } = self;
        let _kept = dir.keep();
        debug!("retained workspace {path}");
        path
    }

    /// Delete the directory and everything in it.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory could not be fully removed.
    pub fn remove(self) -> io::Result<()> {
        let Self { dir, path } = self;
        dir.close()?;
        debug!("removed workspace {path}");
        Ok(())
    }
}

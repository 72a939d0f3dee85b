//! Bootstrap controller.
//!
//! Runs one upgrade attempt through the phases
//! `CheckVersion -> (Satisfied | NeedsUpgrade) -> Downloading -> Installing -> Done`,
//! with `Aborted` reachable from the download and install phases. The
//! controller owns the temporary workspace and decides its fate: it is
//! retained only when a digest mismatch is detected and removed on every
//! other path.

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info, warn};

use crate::artefact::download::ArtefactFetcher;
use crate::artefact::manifest::Manifest;
use crate::artefact::sha256_digest::Sha256Digest;
use crate::artefact::verification::{HashMismatch, sha256_file};
use crate::error::{BootstrapError, Result};
use crate::mirrors::MirrorList;
use crate::orchestrator::{DownloadError, DownloadOrchestrator};
use crate::pip::{CommandExecutor, DEFAULT_PIP, install_artefacts, query_pip_version};
use crate::version::PipVersion;
use crate::workspace::Workspace;

/// Controller phases, logged as the attempt progresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Asking pip for its version.
    CheckVersion,
    /// The installed pip is already new enough.
    Satisfied,
    /// The installed pip is older than the target.
    NeedsUpgrade,
    /// Fetching and verifying the pinned archives.
    Downloading,
    /// Running `pip install` on the verified archives.
    Installing,
    /// The upgrade completed.
    Done,
    /// The attempt stopped early.
    Aborted,
}

/// How a bootstrap attempt ended without a fatal error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// pip already met the target; nothing was downloaded.
    Satisfied {
        /// The installed version.
        current: PipVersion,
    },
    /// pip was upgraded from the verified archives.
    Upgraded {
        /// The version that was replaced.
        from: PipVersion,
        /// The version now installed.
        to: PipVersion,
    },
    /// An archive failed digest verification. Nothing was installed.
    Tampered {
        /// The mismatch details.
        mismatch: HashMismatch,
        /// The workspace left on disk for inspection.
        workspace: Utf8PathBuf,
        /// The kept file re-hashed after the run, or `None` if it could not
        /// be read.
        on_disk: Option<Sha256Digest>,
    },
}

/// Upgrades pip from hash-pinned archives.
///
/// Collaborators are injected so each phase can be exercised with stubs.
///
/// # Examples
///
/// ```no_run
/// use pipstrap::artefact::download::HttpFetcher;
/// use pipstrap::bootstrap::{Bootstrapper, Outcome};
/// use pipstrap::mirrors::MirrorList;
/// use pipstrap::pip::SystemCommandExecutor;
///
/// let executor = SystemCommandExecutor;
/// let fetcher = HttpFetcher;
/// let outcome = Bootstrapper::new(&executor, &fetcher, MirrorList::default()).run()?;
/// assert!(!matches!(outcome, Outcome::Tampered { .. }));
/// # Ok::<(), pipstrap::error::BootstrapError>(())
/// ```
pub struct Bootstrapper<'a> {
    executor: &'a dyn CommandExecutor,
    fetcher: &'a dyn ArtefactFetcher,
    mirrors: MirrorList,
    pip: String,
    manifest: Option<Manifest>,
    workspace_parent: Option<Utf8PathBuf>,
}

impl<'a> Bootstrapper<'a> {
    /// Create a controller that runs `pip` from `PATH` and uses the pinned
    /// manifest for the detected runtime.
    #[must_use]
    pub fn new(
        executor: &'a dyn CommandExecutor,
        fetcher: &'a dyn ArtefactFetcher,
        mirrors: MirrorList,
    ) -> Self {
        Self {
            executor,
            fetcher,
            mirrors,
            pip: DEFAULT_PIP.to_owned(),
            manifest: None,
            workspace_parent: None,
        }
    }

    /// Use a specific pip executable.
    #[must_use]
    pub fn with_pip(mut self, pip: impl Into<String>) -> Self {
        self.pip = pip.into();
        self
    }

    /// Download `manifest` instead of the pinned one.
    #[must_use]
    pub fn with_manifest(mut self, manifest: Manifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    /// Create the workspace below `parent` instead of the system temporary
    /// directory.
    #[must_use]
    pub fn with_workspace_parent(mut self, parent: impl Into<Utf8PathBuf>) -> Self {
        self.workspace_parent = Some(parent.into());
        self
    }

    /// Run one bootstrap attempt.
    ///
    /// # Errors
    ///
    /// Returns an error if pip cannot be queried, the workspace cannot be
    /// created, no mirror can serve the archives, or `pip install` fails. The
    /// workspace has already been removed when an error is returned. A digest
    /// mismatch is not an error: it is reported as [`Outcome::Tampered`].
    pub fn run(&self) -> Result<Outcome> {
        enter(Phase::CheckVersion);
        let installed = query_pip_version(self.executor, &self.pip)?;
        let target = PipVersion::target();

        if installed.version.satisfies(&target) {
            enter(Phase::Satisfied);
            info!("pip {} already satisfies {target}", installed.version);
            return Ok(Outcome::Satisfied {
                current: installed.version,
            });
        }

        enter(Phase::NeedsUpgrade);
        let manifest = match &self.manifest {
            Some(manifest) => manifest.clone(),
            None => Manifest::pinned(installed.runtime_capability())?,
        };
        let workspace = self.create_workspace()?;

        enter(Phase::Downloading);
        let orchestrator = DownloadOrchestrator::new(&manifest, &self.mirrors, self.fetcher);
        let artefacts = match orchestrator.download_all(workspace.path()) {
            Ok(artefacts) => artefacts,
            Err(DownloadError::Tampered(mismatch)) => {
                enter(Phase::Aborted);
                let workspace = workspace.retain();
                warn!("digest mismatch for {}; kept {workspace}", mismatch.url);
                let on_disk = rehash_retained(&mismatch.path);
                return Ok(Outcome::Tampered {
                    mismatch,
                    workspace,
                    on_disk,
                });
            }
            Err(err) => {
                enter(Phase::Aborted);
                discard(workspace);
                return Err(err.into());
            }
        };

        enter(Phase::Installing);
        if let Err(err) = install_artefacts(self.executor, &self.pip, &artefacts, &installed.version)
        {
            enter(Phase::Aborted);
            discard(workspace);
            return Err(err);
        }

        discard(workspace);
        enter(Phase::Done);
        Ok(Outcome::Upgraded {
            from: installed.version,
            to: target,
        })
    }

    fn create_workspace(&self) -> Result<Workspace> {
        self.workspace_parent
            .as_deref()
            .map_or_else(Workspace::create, Workspace::create_in)
            .map_err(|source| BootstrapError::Workspace { source })
    }
}

fn enter(phase: Phase) {
    debug!("bootstrap phase: {phase:?}");
}

fn rehash_retained(path: &Utf8Path) -> Option<Sha256Digest> {
    match sha256_file(path) {
        Ok(digest) => {
            debug!("kept {path} hashes to {digest}");
            Some(digest)
        }
        Err(err) => {
            warn!("could not re-hash kept file {path}: {err}");
            None
        }
    }
}

/// Remove the workspace; a failure here does not change the outcome.
fn discard(workspace: Workspace) {
    let path: Utf8PathBuf = workspace.path().to_owned();
    if let Err(err) = workspace.remove() {
        warn!("could not remove workspace {path}: {err}");
    }
}

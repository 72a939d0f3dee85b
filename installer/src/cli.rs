//! CLI argument definitions for pipstrap.
//!
//! The mirror settings can be given as flags or through the environment
//! variables the tool has always honoured; flags take precedence.

use clap::Parser;
use log::LevelFilter;

use crate::mirrors::{INDEX_BASE_ENV, MIRRORS_ENV, MirrorSelection};
use crate::pip::DEFAULT_PIP;

/// Upgrade pip to a known-good version from hash-pinned archives.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "pipstrap")]
#[command(version, about)]
#[command(long_about = concat!(
    "Upgrade pip to a known-good version from hash-pinned archives.\n\n",
    "If the installed pip is older than the pinned release, pipstrap downloads ",
    "the pinned pip, setuptools and wheel archives, verifies each against its ",
    "SHA-256 digest, and installs them with pip's index disabled. Nothing is ",
    "installed unless every archive verifies.",
))]
#[command(after_help = concat!(
    "MIRRORS:\n",
    "  unset           Download from https://pypi.python.org only\n",
    "  yes             Try pypi.python.org, then the built-in fallback mirrors\n",
    "  <URL>           Download from this index base only\n\n",
    "EXIT STATUS:\n",
    "  0  pip is up to date or was upgraded\n",
    "  1  a download did not match its pinned digest (files kept for inspection)\n",
    "  2  any other failure\n",
))]
pub struct Cli {
    /// pip executable to check and upgrade.
    #[arg(long, value_name = "PROGRAM", default_value = DEFAULT_PIP)]
    pub pip: String,

    /// Index base to download from, or `yes` to enable fallback mirrors.
    #[arg(long, env = MIRRORS_ENV, value_name = "URL|yes")]
    pub mirrors: Option<String>,

    /// Single index base to download from (older name for --mirrors URL).
    #[arg(long, env = INDEX_BASE_ENV, value_name = "URL", hide = true)]
    pub index_base: Option<String>,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors and tamper reports still shown).
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,
}

impl Cli {
    /// Resolve the mirror list from the mirror settings.
    ///
    /// # Examples
    ///
    /// ```
    /// use pipstrap::cli::Cli;
    /// use pipstrap::mirrors::MirrorSource;
    ///
    /// let cli = Cli { mirrors: Some("yes".to_owned()), ..Cli::default() };
    /// assert_eq!(cli.mirror_selection().source, MirrorSource::Fallback);
    /// ```
    #[must_use]
    pub fn mirror_selection(&self) -> MirrorSelection {
        MirrorSelection::resolve(self.mirrors.as_deref(), self.index_base.as_deref())
    }

    /// The default log level; `RUST_LOG` overrides it.
    #[must_use]
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Error;
        }
        match self.verbosity {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

impl Default for Cli {
    /// Creates a `Cli` with no overrides, as if run without arguments in a
    /// clean environment.
    fn default() -> Self {
        Self {
            pip: DEFAULT_PIP.to_owned(),
            mirrors: None,
            index_base: None,
            verbosity: 0,
            quiet: false,
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;

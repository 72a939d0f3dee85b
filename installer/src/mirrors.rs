//! Mirror selection.
//!
//! Resolves the ordered list of index bases to download from. The choice is
//! a trust/availability tradeoff: an explicit base means "trust exactly this
//! source and fail closed", while fallback mode accepts a fixed list of
//! alternate mirrors for networks where the default index is unreachable.

use std::fmt;

/// The index that hosts the pinned archives by default.
pub const DEFAULT_INDEX_BASE: &str = "https://pypi.python.org";

/// Setting value that enables fallback to [`FALLBACK_MIRRORS`].
pub const FALLBACK_SENTINEL: &str = "yes";

/// Alternate mirrors tried, in order, after the default index.
///
/// Each serves the same `/packages/<hash path>` layout as the default index.
pub const FALLBACK_MIRRORS: &[&str] = &[
    "https://pypi.tuna.tsinghua.edu.cn",
    "https://mirrors.aliyun.com/pypi",
];

/// Environment variable selecting the mirror mode.
pub const MIRRORS_ENV: &str = "PIPSTRAP_MIRRORS";

/// Legacy environment variable naming a single explicit index base.
pub const INDEX_BASE_ENV: &str = "PIPSTRAP_INDEX_BASE";

/// How the mirror list was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorSource {
    /// No override; only the default index is used.
    Default,
    /// Fallback mode; the default index then the alternate mirrors.
    Fallback,
    /// An explicit base from the named setting; no fallback.
    Explicit {
        /// The environment variable the override came from.
        variable: &'static str,
    },
}

/// An ordered, non-empty list of index bases.
///
/// # Examples
///
/// ```
/// use pipstrap::mirrors::{DEFAULT_INDEX_BASE, MirrorList};
///
/// let mirrors = MirrorList::default();
/// assert_eq!(mirrors.bases(), [DEFAULT_INDEX_BASE]);
///
/// let mirrors = MirrorList::new(["https://mirror.example/", "  "]);
/// assert_eq!(mirrors.bases(), ["https://mirror.example"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorList {
    bases: Vec<String>,
}

impl MirrorList {
    /// Build a list from explicit bases, preserving order.
    ///
    /// Trailing slashes are stripped and blank entries dropped; if nothing
    /// remains the default index is used.
    #[must_use]
    pub fn new<I, S>(bases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let bases: Vec<String> = bases
            .into_iter()
            .map(|base| normalise_base(base.as_ref()))
            .filter(|base| !base.is_empty())
            .collect();
        if bases.is_empty() {
            return Self::default();
        }
        Self { bases }
    }

    /// Bases in the order they should be tried.
    #[must_use]
    pub fn bases(&self) -> &[String] {
        &self.bases
    }

    /// Number of bases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    /// Always false; the list holds at least the default index.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }
}

impl Default for MirrorList {
    fn default() -> Self {
        Self {
            bases: vec![DEFAULT_INDEX_BASE.to_owned()],
        }
    }
}

impl fmt::Display for MirrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.bases.join(", "))
    }
}

/// The resolved mirror list together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorSelection {
    /// The bases to try.
    pub mirrors: MirrorList,
    /// Which setting produced them.
    pub source: MirrorSource,
}

impl MirrorSelection {
    /// Resolve the mirror list from both supported settings.
    ///
    /// An unset or empty `mirrors` selects the default index only,
    /// [`FALLBACK_SENTINEL`] selects the default index followed by
    /// [`FALLBACK_MIRRORS`], and any other value is the single base to use.
    /// When `mirrors` is unset or empty, a non-empty legacy `index_base` is
    /// treated as an explicit single base.
    ///
    /// # Examples
    ///
    /// ```
    /// use pipstrap::mirrors::{MirrorSelection, MirrorSource};
    ///
    /// let selection = MirrorSelection::resolve(None, Some("https://legacy.example"));
    /// assert_eq!(selection.mirrors.bases(), ["https://legacy.example"]);
    /// assert_eq!(
    ///     selection.source,
    ///     MirrorSource::Explicit { variable: "PIPSTRAP_INDEX_BASE" }
    /// );
    /// ```
    #[must_use]
    pub fn resolve(mirrors: Option<&str>, index_base: Option<&str>) -> Self {
        let (mirrors, source) = resolve(mirrors, index_base);
        Self { mirrors, source }
    }

    /// Notice to show the user when an explicit override is in effect.
    #[must_use]
    pub fn override_notice(&self) -> Option<String> {
        match &self.source {
            MirrorSource::Explicit { variable } => Some(format!(
                "pipstrap is using alternative index address {} because the \
                 environment variable {variable} was set.",
                self.mirrors
            )),
            MirrorSource::Default | MirrorSource::Fallback => None,
        }
    }
}

fn resolve(mirrors: Option<&str>, index_base: Option<&str>) -> (MirrorList, MirrorSource) {
    match non_empty(mirrors) {
        Some(FALLBACK_SENTINEL) => (
            MirrorList::new(std::iter::once(DEFAULT_INDEX_BASE).chain(FALLBACK_MIRRORS.iter().copied())),
            MirrorSource::Fallback,
        ),
        Some(base) => (
            MirrorList::new([base]),
            MirrorSource::Explicit {
                variable: MIRRORS_ENV,
            },
        ),
        None => non_empty(index_base).map_or_else(
            || (MirrorList::default(), MirrorSource::Default),
            |base| {
                (
                    MirrorList::new([base]),
                    MirrorSource::Explicit {
                        variable: INDEX_BASE_ENV,
                    },
                )
            },
        ),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !normalise_base(v).is_empty())
}

fn normalise_base(base: &str) -> String {
    base.trim().trim_end_matches('/').to_owned()
}

/// Build the download URL for an artefact below a mirror base.
///
/// # Examples
///
/// ```
/// use pipstrap::mirrors::artefact_url;
///
/// assert_eq!(
///     artefact_url("https://good.example", "ab/cd/pkgA-1.0.tar.gz"),
///     "https://good.example/packages/ab/cd/pkgA-1.0.tar.gz"
/// );
/// ```
#[must_use]
pub fn artefact_url(base: &str, relative_path: &str) -> String {
    format!("{base}/packages/{relative_path}")
}

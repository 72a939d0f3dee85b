//! Package-manager version parsing and ordering.
//!
//! pip versions are not strict semver: they may have two components
//! (`8.0`), a pre-release suffix glued to the last number (`10.0.0b1`), or a
//! post-release tag (`8.0.3.post1`). They are normalised onto
//! [`semver::Version`] so comparison is numeric per component rather than
//! lexicographic.

use semver::{BuildMetadata, Prerelease, Version};
use std::fmt;
use std::str::FromStr;

use crate::artefact::manifest::PIP_VERSION;

/// The first pip release that accepts `--no-cache-dir`.
const NO_CACHE_DIR_SINCE: (u64, u64) = (6, 0);

/// Errors arising from unparseable version strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version \"{value}\": {reason}")]
pub struct VersionError {
    /// The rejected version string.
    pub value: String,
    /// Description of the parse failure.
    pub reason: String,
}

/// A parsed pip version.
///
/// # Examples
///
/// ```
/// use pipstrap::version::PipVersion;
///
/// let old: PipVersion = "7.1.2".parse()?;
/// let new: PipVersion = "10.0".parse()?;
/// assert!(old < new);
/// assert!(new >= PipVersion::target());
/// # Ok::<(), pipstrap::version::VersionError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PipVersion(Version);

impl PipVersion {
    /// The version this tool installs.
    #[must_use]
    pub fn target() -> Self {
        Self(Version::parse(PIP_VERSION).unwrap_or_else(|_| Version::new(8, 0, 3)))
    }

    /// Build a release version from numeric components.
    #[must_use]
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(Version::new(major, minor, patch))
    }

    /// Whether this version satisfies `minimum`.
    #[must_use]
    pub fn satisfies(&self, minimum: &Self) -> bool {
        self >= minimum
    }

    /// Whether `pip install` at this version understands `--no-cache-dir`.
    #[must_use]
    pub fn supports_no_cache_dir(&self) -> bool {
        (self.0.major, self.0.minor) >= NO_CACHE_DIR_SINCE
    }
}

impl FromStr for PipVersion {
    type Err = VersionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let fail = |reason: &str| VersionError {
            value: value.to_owned(),
            reason: reason.to_owned(),
        };

        let trimmed = value.trim();
        let split = trimmed
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(trimmed.len());
        let (numeric, suffix) = trimmed.split_at(split);
        let numeric = numeric.trim_end_matches('.');
        if numeric.is_empty() {
            return Err(fail("expected a leading number"));
        }

        let mut components = [0u64; 3];
        let mut count = 0;
        for part in numeric.split('.') {
            let slot = components
                .get_mut(count)
                .ok_or_else(|| fail("more than three numeric components"))?;
            *slot = part
                .parse()
                .map_err(|_| fail("components must be non-negative integers"))?;
            count += 1;
        }

        let [major, minor, patch] = components;
        let mut version = Version::new(major, minor, patch);
        version.pre = parse_prerelease(suffix).map_err(|reason| fail(&reason))?;
        version.build = BuildMetadata::EMPTY;
        Ok(Self(version))
    }
}

/// Map a pip-style suffix onto a semver pre-release.
///
/// Post-releases sort after their release, which semver cannot express, so
/// they compare equal to it instead. A local label (`+ubuntu1`) does not
/// affect ordering and is dropped.
fn parse_prerelease(suffix: &str) -> Result<Prerelease, String> {
    let public = suffix.split_once('+').map_or(suffix, |(public, _)| public);
    let tag = public.trim_start_matches(['.', '-', '_']);
    if tag.is_empty() || tag.starts_with("post") {
        return Ok(Prerelease::EMPTY);
    }
    Prerelease::new(tag).map_err(|e| format!("unsupported suffix \"{suffix}\": {e}"))
}

impl fmt::Display for PipVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn v(value: &str) -> PipVersion {
        value.parse().expect("valid version")
    }

    #[test]
    fn target_is_pinned_pip_version() {
        assert_eq!(PipVersion::target(), PipVersion::new(8, 0, 3));
    }

    #[rstest]
    #[case::two_components("8.0", PipVersion::new(8, 0, 0))]
    #[case::one_component("9", PipVersion::new(9, 0, 0))]
    #[case::trailing_dot("8.0.", PipVersion::new(8, 0, 0))]
    #[case::post_release("8.0.3.post1", PipVersion::new(8, 0, 3))]
    #[case::local_label("8.0.3+local", PipVersion::new(8, 0, 3))]
    #[case::post_and_local("8.0.3.post1+deb9u1", PipVersion::new(8, 0, 3))]
    fn parses_short_and_post_versions(#[case] input: &str, #[case] expected: PipVersion) {
        assert_eq!(v(input), expected);
    }

    #[test]
    fn local_label_satisfies_its_release() {
        assert!(v("8.0.3+ubuntu1").satisfies(&PipVersion::target()));
    }

    #[test]
    fn local_label_keeps_prerelease_ordering() {
        assert!(v("10.0.0b1+local") < v("10.0.0"));
        assert!(v("10.0.0b1+local") > v("9.0.3"));
    }

    #[rstest]
    #[case::numeric_not_lexicographic("9.0.1", "10.0.0")]
    #[case::minor("8.0.3", "8.1.0")]
    #[case::patch("8.0.2", "8.0.3")]
    #[case::prerelease_before_release("10.0.0b1", "10.0.0")]
    #[case::prerelease_order("10.0.0a1", "10.0.0b1")]
    fn orders_numerically(#[case] lower: &str, #[case] higher: &str) {
        assert!(v(lower) < v(higher), "{lower} should sort before {higher}");
    }

    #[rstest]
    #[case::older("7.1.2", false)]
    #[case::equal("8.0.3", true)]
    #[case::newer("20.3.4", true)]
    #[case::prerelease_of_target("8.0.3b1", false)]
    fn satisfies_target(#[case] installed: &str, #[case] expected: bool) {
        assert_eq!(v(installed).satisfies(&PipVersion::target()), expected);
    }

    #[rstest]
    #[case::empty("")]
    #[case::word("pip")]
    #[case::four_components("1.2.3.4")]
    #[case::bad_suffix("1.2.3!")]
    fn rejects_malformed(#[case] input: &str) {
        assert!(input.parse::<PipVersion>().is_err(), "{input} should not parse");
    }

    #[rstest]
    #[case::old("1.5.6", false)]
    #[case::first("6.0", true)]
    #[case::later("7.1.2", true)]
    fn no_cache_dir_support(#[case] installed: &str, #[case] expected: bool) {
        assert_eq!(v(installed).supports_no_cache_dir(), expected);
    }
}

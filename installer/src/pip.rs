//! Package-manager invocation.
//!
//! pip is only ever run with an argument vector, never through a shell, so
//! workspace paths containing spaces or quotes reach it unchanged. The
//! human-readable command line used in logs and errors quotes each argument
//! separately.

use log::{debug, info};
use std::process::{Command, Output};

use crate::artefact::manifest::RuntimeCapability;
use crate::artefact::verification::VerifiedArtefact;
use crate::error::{BootstrapError, Result};
use crate::version::PipVersion;

/// The pip executable used when none is configured.
pub const DEFAULT_PIP: &str = "pip";

/// Abstraction for running external commands.
#[cfg_attr(test, mockall::automock)]
pub trait CommandExecutor {
    /// Runs a program with arguments and returns the captured output.
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while spawning or running the
    /// program.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use pipstrap::pip::{CommandExecutor, SystemCommandExecutor};
    ///
    /// let output = SystemCommandExecutor.run("pip", &["--version".to_owned()])?;
    /// assert!(output.status.success());
    /// # Ok::<(), pipstrap::error::BootstrapError>(())
    /// ```
    fn run(&self, program: &str, args: &[String]) -> Result<Output>;
}

/// Executes commands on the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, program: &str, args: &[String]) -> Result<Output> {
        Command::new(program)
            .args(args)
            .output()
            .map_err(BootstrapError::from)
    }
}

/// What `pip --version` reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipInfo {
    /// The installed pip version.
    pub version: PipVersion,
    /// The `(major, minor)` Python version pip runs under, when reported.
    pub python: Option<(u32, u32)>,
}

impl PipInfo {
    /// The runtime capability that selects the manifest.
    ///
    /// An unreported runtime is assumed to be modern.
    #[must_use]
    pub fn runtime_capability(&self) -> RuntimeCapability {
        self.python
            .map_or_else(RuntimeCapability::default, |(major, minor)| {
                RuntimeCapability::for_python(major, minor)
            })
    }
}

/// Parse the output of `pip --version`.
///
/// The version is the second whitespace-separated token; the runtime comes
/// from a trailing `(python X.Y)` group when present.
///
/// # Errors
///
/// Returns [`BootstrapError::VersionParse`] if there is no second token or it
/// is not a version.
///
/// # Examples
///
/// ```
/// use pipstrap::pip::parse_version_output;
///
/// let info = parse_version_output("pip 7.1.2 from /usr/lib/python2.7/site-packages (python 2.7)")?;
/// assert_eq!(info.version.to_string(), "7.1.2");
/// assert_eq!(info.python, Some((2, 7)));
/// # Ok::<(), pipstrap::error::BootstrapError>(())
/// ```
pub fn parse_version_output(output: &str) -> Result<PipInfo> {
    let parse_error = |reason: String| BootstrapError::VersionParse {
        output: output.trim().to_owned(),
        reason,
    };

    let token = output
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| parse_error("expected `pip <version> ...`".to_owned()))?;
    let version = token
        .parse::<PipVersion>()
        .map_err(|err| parse_error(err.to_string()))?;

    Ok(PipInfo {
        version,
        python: parse_python_runtime(output),
    })
}

fn parse_python_runtime(output: &str) -> Option<(u32, u32)> {
    let (_, rest) = output.rsplit_once("(python ")?;
    let (version, _) = rest.split_once(')')?;
    let mut parts = version.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}

/// Run `<pip> --version` and parse the result.
///
/// # Errors
///
/// Returns [`BootstrapError::VersionQuery`] if pip cannot be started or exits
/// unsuccessfully, and [`BootstrapError::VersionParse`] if its output is not
/// understood.
pub fn query_pip_version(executor: &dyn CommandExecutor, pip: &str) -> Result<PipInfo> {
    let query_error = |reason: String| BootstrapError::VersionQuery {
        program: pip.to_owned(),
        reason,
    };

    let output = executor
        .run(pip, &["--version".to_owned()])
        .map_err(|err| match err {
            BootstrapError::Io(source) => query_error(source.to_string()),
            other => other,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(query_error(format!(
            "exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    // Very old releases print the banner on stderr.
    let stdout = String::from_utf8_lossy(&output.stdout);
    let text = if stdout.trim().is_empty() {
        String::from_utf8_lossy(&output.stderr)
    } else {
        stdout
    };
    let info = parse_version_output(&text)?;
    debug!("{pip} reports version {} (python {:?})", info.version, info.python);
    Ok(info)
}

/// Build the `pip install` argument vector for the verified artefacts.
///
/// # Examples
///
/// ```
/// use pipstrap::pip::install_args;
///
/// let args = install_args(&[], true);
/// assert_eq!(args, ["install", "--no-index", "--no-deps", "--upgrade", "--no-cache-dir"]);
/// ```
#[must_use]
pub fn install_args(artefacts: &[VerifiedArtefact], no_cache_dir: bool) -> Vec<String> {
    let mut args: Vec<String> = ["install", "--no-index", "--no-deps", "--upgrade"]
        .into_iter()
        .map(str::to_owned)
        .collect();
    if no_cache_dir {
        args.push("--no-cache-dir".to_owned());
    }
    args.extend(
        artefacts
            .iter()
            .map(|artefact| artefact.path().as_str().to_owned()),
    );
    args
}

/// Install the verified artefacts with network access disabled.
///
/// `installed` is the version being replaced; it decides whether
/// `--no-cache-dir` is understood.
///
/// # Errors
///
/// Returns [`BootstrapError::InstallerFailure`] with the captured output if
/// pip exits unsuccessfully, or the executor's error if it cannot be run.
pub fn install_artefacts(
    executor: &dyn CommandExecutor,
    pip: &str,
    artefacts: &[VerifiedArtefact],
    installed: &PipVersion,
) -> Result<()> {
    let args = install_args(artefacts, installed.supports_no_cache_dir());
    let command = display_command(pip, &args);
    info!("running {command}");

    let output = executor.run(pip, &args)?;
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        return Err(BootstrapError::InstallerFailure {
            command,
            code: output.status.code(),
            stdout,
            stderr,
        });
    }

    debug!("{}", stdout.trim_end());
    Ok(())
}

/// Render a program and its arguments as a copy-pasteable command line.
///
/// # Examples
///
/// ```
/// use pipstrap::pip::display_command;
///
/// let args = ["install".to_owned(), "/tmp/my dir/pip-8.0.3.tar.gz".to_owned()];
/// assert_eq!(display_command("pip", &args), "pip install '/tmp/my dir/pip-8.0.3.tar.gz'");
/// ```
#[must_use]
pub fn display_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(shell_quote)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Quote one argument for a POSIX shell if it needs it.
#[must_use]
pub fn shell_quote(arg: &str) -> String {
    let is_plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c));
    if is_plain {
        return arg.to_owned();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artefact::sha256_digest::Sha256Digest;
    use crate::artefact::verification::verify_digest;
    use crate::test_utils::{exit_status, failure_output, success_output, version_output};
    use camino::Utf8Path;
    use rstest::rstest;

    fn artefact(path: &str) -> VerifiedArtefact {
        let digest = Sha256Digest::try_from("a".repeat(64)).expect("valid digest");
        verify_digest("https://good.example", Utf8Path::new(path), digest.clone(), &digest)
            .expect("digests match")
    }

    #[rstest]
    #[case::modern(
        "pip 7.1.2 from /usr/lib/python3.4/site-packages (python 3.4)",
        "7.1.2",
        Some((3, 4))
    )]
    #[case::legacy(
        "pip 1.5.6 from /usr/lib/python2.6/site-packages (python 2.6)",
        "1.5.6",
        Some((2, 6))
    )]
    #[case::no_runtime("pip 9.0.1", "9.0.1", None)]
    #[case::trailing_newline("pip 10.0.1 from /x (python 3.6)\n", "10.0.1", Some((3, 6)))]
    fn parses_version_banner(
        #[case] banner: &str,
        #[case] version: &str,
        #[case] python: Option<(u32, u32)>,
    ) {
        let info = parse_version_output(banner).expect("banner parses");
        assert_eq!(info.version.to_string(), version);
        assert_eq!(info.python, python);
    }

    #[rstest]
    #[case::empty("")]
    #[case::single_token("pip")]
    #[case::not_a_version("pip from /usr/lib")]
    fn rejects_unparseable_banner(#[case] banner: &str) {
        let err = parse_version_output(banner).expect_err("banner should not parse");
        assert!(matches!(err, BootstrapError::VersionParse { .. }));
    }

    #[rstest]
    #[case::legacy(Some((2, 6)), RuntimeCapability::Legacy)]
    #[case::modern(Some((2, 7)), RuntimeCapability::Modern)]
    #[case::unknown(None, RuntimeCapability::Modern)]
    fn runtime_capability_from_python(
        #[case] python: Option<(u32, u32)>,
        #[case] expected: RuntimeCapability,
    ) {
        let info = PipInfo {
            version: PipVersion::new(7, 1, 2),
            python,
        };
        assert_eq!(info.runtime_capability(), expected);
    }

    #[test]
    fn query_runs_version_flag() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_run()
            .withf(|program, args| program == "pip2" && args == ["--version"])
            .times(1)
            .returning(|_, _| Ok(success_output(&version_output("7.1.2", "2.7"))));

        let info = query_pip_version(&executor, "pip2").expect("query succeeds");
        assert_eq!(info.version, PipVersion::new(7, 1, 2));
    }

    #[test]
    fn query_reports_missing_program() {
        let mut executor = MockCommandExecutor::new();
        executor.expect_run().returning(|_, _| {
            Err(BootstrapError::Io(std::io::Error::from(
                std::io::ErrorKind::NotFound,
            )))
        });

        let err = query_pip_version(&executor, "pip").expect_err("spawn fails");
        assert!(matches!(err, BootstrapError::VersionQuery { ref program, .. } if program == "pip"));
    }

    #[test]
    fn query_reports_failed_exit() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_run()
            .returning(|_, _| Ok(failure_output("ImportError: No module named pip")));

        let err = query_pip_version(&executor, "pip").expect_err("pip fails");
        assert!(err.to_string().contains("No module named pip"));
    }

    #[test]
    fn query_falls_back_to_stderr_banner() {
        let mut executor = MockCommandExecutor::new();
        executor.expect_run().returning(|_, _| {
            Ok(Output {
                status: exit_status(0),
                stdout: Vec::new(),
                stderr: version_output("1.5.6", "2.6").into_bytes(),
            })
        });

        let info = query_pip_version(&executor, "pip").expect("query succeeds");
        assert_eq!(info.runtime_capability(), RuntimeCapability::Legacy);
    }

    #[rstest]
    #[case::with_cache_flag(true)]
    #[case::without_cache_flag(false)]
    fn install_args_keep_paths_as_separate_arguments(#[case] no_cache_dir: bool) {
        let artefacts = [
            artefact("/tmp/pipstrap-x/pip-8.0.3.tar.gz"),
            artefact("/tmp/pipstrap-x/with space/wheel-0.29.0.tar.gz"),
        ];
        let args = install_args(&artefacts, no_cache_dir);

        assert_eq!(args.contains(&"--no-cache-dir".to_owned()), no_cache_dir);
        assert_eq!(
            args.iter().rev().take(2).collect::<Vec<_>>(),
            [
                "/tmp/pipstrap-x/with space/wheel-0.29.0.tar.gz",
                "/tmp/pipstrap-x/pip-8.0.3.tar.gz"
            ]
        );
        assert!(args.starts_with(&[
            "install".to_owned(),
            "--no-index".to_owned(),
            "--no-deps".to_owned(),
            "--upgrade".to_owned(),
        ]));
    }

    #[test]
    fn install_omits_cache_flag_for_old_pip() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_run()
            .withf(|_, args| !args.iter().any(|arg| arg == "--no-cache-dir"))
            .times(1)
            .returning(|_, _| Ok(success_output("")));

        install_artefacts(
            &executor,
            "pip",
            &[artefact("/tmp/pipstrap-x/pip-8.0.3.tar.gz")],
            &PipVersion::new(1, 5, 6),
        )
        .expect("install succeeds");
    }

    #[test]
    fn install_failure_carries_output_and_quoted_command() {
        let mut executor = MockCommandExecutor::new();
        executor.expect_run().returning(|_, _| {
            Ok(Output {
                status: exit_status(1),
                stdout: b"Processing\n".to_vec(),
                stderr: b"error: invalid archive\n".to_vec(),
            })
        });

        let err = install_artefacts(
            &executor,
            "pip",
            &[artefact("/tmp/my dir/pip-8.0.3.tar.gz")],
            &PipVersion::new(7, 1, 2),
        )
        .expect_err("install fails");

        let BootstrapError::InstallerFailure {
            command,
            code,
            stdout,
            stderr,
        } = err
        else {
            panic!("expected installer failure");
        };
        assert!(command.ends_with("'/tmp/my dir/pip-8.0.3.tar.gz'"));
        assert_eq!(code, Some(1));
        assert_eq!(stdout, "Processing\n");
        assert_eq!(stderr, "error: invalid archive\n");
    }

    #[rstest]
    #[case::plain("pip-8.0.3.tar.gz", "pip-8.0.3.tar.gz")]
    #[case::space("my dir", "'my dir'")]
    #[case::quote("it's", r"'it'\''s'")]
    #[case::empty("", "''")]
    #[case::dollar("$HOME", "'$HOME'")]
    fn shell_quote_cases(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(shell_quote(input), expected);
    }
}

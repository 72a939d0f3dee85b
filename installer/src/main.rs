//! pipstrap CLI entrypoint.
//!
//! Checks the installed pip and, if it is older than the pinned release,
//! upgrades it from hash-verified archives. The exit status distinguishes a
//! tamper report from every other failure.

use clap::Parser;
use std::io::Write;

use pipstrap::artefact::download::{ArtefactFetcher, HttpFetcher};
use pipstrap::bootstrap::Bootstrapper;
use pipstrap::cli::Cli;
use pipstrap::output::{report, write_stderr_line};
use pipstrap::pip::{CommandExecutor, SystemCommandExecutor};

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);
    let mut stderr = std::io::stderr();
    let exit_code = run(&cli, &SystemCommandExecutor, &HttpFetcher, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

/// Installs the logger; `RUST_LOG` takes precedence over the CLI level.
fn init_logging(cli: &Cli) {
    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn run(
    cli: &Cli,
    executor: &dyn CommandExecutor,
    fetcher: &dyn ArtefactFetcher,
    stderr: &mut dyn Write,
) -> i32 {
    let selection = cli.mirror_selection();
    if let Some(notice) = selection.override_notice() {
        write_stderr_line(stderr, notice);
    }

    let result = Bootstrapper::new(executor, fetcher, selection.mirrors)
        .with_pip(cli.pip.as_str())
        .run();
    report(result, cli.quiet, stderr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipstrap::output::{EXIT_FAILURE, EXIT_SUCCESS};
    use pipstrap::test_utils::{
        ExpectedCall, StubExecutor, StubFetcher, success_output, version_output,
    };

    fn stderr_text(stderr: Vec<u8>) -> String {
        String::from_utf8(stderr).expect("stderr was not UTF-8")
    }

    #[test]
    fn run_returns_zero_when_pip_is_current() {
        let executor = StubExecutor::new(vec![ExpectedCall {
            program: "pip",
            args: vec!["--version".to_owned()],
            result: Ok(success_output(&version_output("9.0.1", "3.6"))),
        }]);
        let fetcher = StubFetcher::new();
        let mut stderr = Vec::new();

        let exit_code = run(&Cli::default(), &executor, &fetcher, &mut stderr);

        assert_eq!(exit_code, EXIT_SUCCESS);
        assert!(fetcher.requests().is_empty());
        assert!(stderr_text(stderr).contains("already installed"));
    }

    #[test]
    fn run_prints_notice_for_explicit_mirror() {
        let executor = StubExecutor::new(vec![ExpectedCall {
            program: "/usr/bin/pip2",
            args: vec!["--version".to_owned()],
            result: Ok(success_output(&version_output("8.0.3", "2.7"))),
        }]);
        let cli = Cli {
            pip: "/usr/bin/pip2".to_owned(),
            mirrors: Some("https://mirror.example".to_owned()),
            ..Cli::default()
        };
        let mut stderr = Vec::new();

        let exit_code = run(&cli, &executor, &StubFetcher::new(), &mut stderr);

        assert_eq!(exit_code, EXIT_SUCCESS);
        let text = stderr_text(stderr);
        assert!(text.contains("https://mirror.example"));
        assert!(text.contains("PIPSTRAP_MIRRORS"));
    }

    #[test]
    fn run_returns_two_when_pip_is_missing() {
        let cli = Cli {
            pip: "/nonexistent/pipstrap-missing-pip".to_owned(),
            quiet: true,
            ..Cli::default()
        };
        let mut stderr = Vec::new();

        let exit_code = run(&cli, &SystemCommandExecutor, &StubFetcher::new(), &mut stderr);

        assert_eq!(exit_code, EXIT_FAILURE);
        assert!(stderr_text(stderr).contains("/nonexistent/pipstrap-missing-pip"));
    }
}

//! pipstrap library.
//!
//! Upgrades an installed pip to a known-good release by downloading a fixed
//! set of archives, verifying each against a pinned SHA-256 digest, and
//! installing them with pip's index disabled. It is used by the `pipstrap`
//! binary and can be driven programmatically with injected collaborators.
//!
//! # Modules
//!
//! - [`artefact`] - Pinned manifest, fetching, and digest verification
//! - [`bootstrap`] - The controller that runs one upgrade attempt
//! - [`cli`] - Command-line argument definitions
//! - [`error`] - Semantic error types
//! - [`mirrors`] - Mirror list resolution
//! - [`orchestrator`] - Mirror-failover download of the whole manifest
//! - [`output`] - User-facing messages and exit codes
//! - [`pip`] - pip version query and install invocation
//! - [`version`] - pip version parsing and ordering
//! - [`workspace`] - Temporary download directory

pub mod artefact;
pub mod bootstrap;
pub mod cli;
pub mod error;
pub mod mirrors;
pub mod orchestrator;
pub mod output;
pub mod pip;
pub mod version;
pub mod workspace;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;

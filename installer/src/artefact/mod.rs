//! Pinned archives: their digests, how they are fetched, and how they are
//! verified.
//!
//! # Sub-modules
//!
//! - [`download`] - Artefact fetch trait and HTTP implementation.
//! - [`error`] - Validation errors for digests and manifest entries.
//! - [`manifest`] - The pinned `(path, digest)` list (`Manifest`).
//! - [`sha256_digest`] - SHA-256 digest newtype (`Sha256Digest`).
//! - [`verification`] - Streaming digest and the mismatch check.

pub mod download;
pub mod error;
pub mod manifest;
pub mod sha256_digest;
pub mod verification;

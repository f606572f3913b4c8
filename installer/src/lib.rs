//! Nori installer library.
//!
//! Fetches a platform-specific tool archive, verifies its checksum, extracts
//! it safely, installs it under a deterministic path in the nori root, and
//! publishes launchers in the shared shims directory. The `nori-install`
//! binary is a thin wrapper over [`pipeline::Pipeline`].
//!
//! # Modules
//!
//! - [`active`] - Active version per package
//! - [`artefact`] - Digests, descriptors, download, extraction and root detection
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Settings loaded from the nori root
//! - [`dirs`] - Base directory resolution behind a mockable trait
//! - [`error`] - Pipeline error type with recovery hints
//! - [`install`] - Relocation of extracted trees into the installs directory
//! - [`layout`] - Directory layout of the nori root
//! - [`output`] - User-facing messages and JSON summaries
//! - [`pipeline`] - Stage orchestration
//! - [`platform`] - Platform tags and families
//! - [`shim`] - Launcher publishing
//! - [`versions`] - Switching and listing installed versions

pub mod active;
pub mod artefact;
pub mod cli;
pub mod config;
pub mod dirs;
pub mod error;
pub mod install;
pub mod layout;
pub mod output;
pub mod pipeline;
pub mod platform;
pub mod shim;
pub mod versions;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;

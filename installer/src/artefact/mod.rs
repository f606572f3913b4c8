//! Acquiring and unpacking package artefacts.
//!
//! The leaves of the install pipeline: everything needed to turn a URL and
//! an expected checksum into a verified, safely extracted directory tree.
//!
//! # Sub-modules
//!
//! - [`digest`]: typed `<algorithm>:<hex>` digests.
//! - [`checksum`]: constant-time verification of content against a digest.
//! - [`descriptor`]: archive kinds and asset descriptors.
//! - [`cancel`]: cancellation tokens and the injectable backoff clock.
//! - [`download`]: HTTP transport and the retrying fetcher.
//! - [`extraction`]: tar/zip extraction with path traversal protection.
//! - [`root`]: package root detection for extracted trees.

pub mod cancel;
pub mod checksum;
pub mod descriptor;
pub mod digest;
pub mod download;
pub mod extraction;
pub mod root;

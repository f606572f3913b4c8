//! Top-level error type for the install pipeline and CLI.
//!
//! Each stage keeps its own error enum; [`PipelineError`] wraps them so
//! callers can match on the failing stage while `?` composes across stages.
//! Some variants carry a recovery hint for the user.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::active::ActiveVersionsError;
use crate::artefact::checksum::ChecksumError;
use crate::artefact::descriptor::UnknownArchiveKind;
use crate::artefact::digest::DigestError;
use crate::artefact::download::FetchError;
use crate::artefact::extraction::ExtractError;
use crate::config::ConfigError;
use crate::install::InstallError;
use crate::layout::LayoutError;
use crate::platform::PlatformTagError;
use crate::shim::ShimError;

/// Errors surfaced by the pipeline and the `nori-install` binary.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A checksum string could not be parsed.
    #[error(transparent)]
    Digest(#[from] DigestError),

    /// Content did not match its expected digest.
    #[error(transparent)]
    Checksum(#[from] ChecksumError),

    /// Downloading failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Extraction failed.
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// The extracted tree could not be listed.
    #[error("failed to inspect extracted tree {path}")]
    DetectRoot {
        /// The extracted tree.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Installation failed.
    #[error(transparent)]
    Install(#[from] InstallError),

    /// Publishing launchers failed.
    #[error(transparent)]
    Shim(#[from] ShimError),

    /// Settings could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The active-versions file could not be read or written.
    #[error(transparent)]
    ActiveVersions(#[from] ActiveVersionsError),

    /// The root or package key is unusable.
    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// A platform tag could not be parsed.
    #[error(transparent)]
    Platform(#[from] PlatformTagError),

    /// An archive kind could not be parsed.
    #[error(transparent)]
    ArchiveKind(#[from] UnknownArchiveKind),

    /// The requested version has no install directory.
    #[error("{package} is not installed")]
    NotInstalled {
        /// The package key that was looked up.
        package: String,
    },

    /// A local file could not be read.
    #[error("failed to read {path}")]
    ReadFile {
        /// The file being read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Output could not be written.
    #[error("failed to write output")]
    WriteFailed {
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl PipelineError {
    /// A suggestion for resolving the error, where one applies.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Checksum(ChecksumError::Mismatch { .. })
            | Self::Fetch(FetchError::ChecksumFailed { .. }) => Some(
                "the downloaded bytes do not match the expected checksum; \
                 check the descriptor or try another mirror",
            ),
            Self::Fetch(FetchError::Exhausted { .. } | FetchError::Transport { .. }) => {
                Some("check your network connection and retry")
            }
            Self::Extract(ExtractError::UnsupportedCompression { .. }) => {
                Some("only uncompressed or gzip-compressed tar archives are supported")
            }
            Self::Install(InstallError::MissingBinary { .. }) => {
                Some("check the declared --bin paths against the archive layout")
            }
            Self::NotInstalled { .. } => Some("install it first with `nori-install install`"),
            Self::Layout(LayoutError::NoRoot) => Some("pass --root or set NORI_ROOT"),
            _ => None,
        }
    }
}

/// Result type alias using [`PipelineError`].
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artefact::digest::Digest;

    #[test]
    fn checksum_mismatch_reports_both_digests_and_hint() {
        let err = PipelineError::from(ChecksumError::Mismatch {
            expected: Digest::of_sha256(b"a"),
            actual: Digest::of_sha256(b"b"),
        });
        let msg = err.to_string();
        assert!(msg.contains(&Digest::of_sha256(b"a").to_string()));
        assert!(msg.contains(&Digest::of_sha256(b"b").to_string()));
        assert!(err.hint().is_some());
    }

    #[test]
    fn missing_binary_names_path() {
        let err = PipelineError::from(InstallError::MissingBinary {
            path: "bin/missing".to_owned(),
        });
        assert!(err.to_string().contains("bin/missing"));
        assert!(err.hint().is_some_and(|hint| hint.contains("--bin")));
    }

    #[test]
    fn detect_root_preserves_source() {
        let err = PipelineError::DetectRoot {
            path: PathBuf::from("/tmp/x"),
            source: io::Error::other("gone"),
        };
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.hint(), None);
    }
}

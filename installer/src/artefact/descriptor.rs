//! Asset descriptors: one downloadable, platform-specific archive.

use super::digest::Digest;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Archive container formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveKind {
    /// A tar stream, optionally gzip-compressed.
    Tar,
    /// A zip archive.
    Zip,
}

/// Error returned when parsing an unknown archive kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported archive kind \"{0}\"; expected \"tar\" or \"zip\"")]
pub struct UnknownArchiveKind(String);

impl FromStr for ArchiveKind {
    type Err = UnknownArchiveKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "tar" => Ok(Self::Tar),
            "zip" => Ok(Self::Zip),
            other => Err(UnknownArchiveKind(other.to_owned())),
        }
    }
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tar => f.write_str("tar"),
            Self::Zip => f.write_str("zip"),
        }
    }
}

/// Download URL, archive kind, and expected checksum of one asset.
///
/// Deserialises from the manifest asset shape:
///
/// ```
/// use nori_installer::artefact::descriptor::{ArchiveKind, AssetDescriptor};
///
/// let json = r#"{
///     "type": "tar",
///     "url": "https://example.test/tool-1.0.0-linux-amd64.tar.gz",
///     "checksum": "sha256:09ca7e4eaa6e8ae9c7d261167129184883644d07dfba7cbfbc4c8a2e08360d5b"
/// }"#;
/// let asset: AssetDescriptor = serde_json::from_str(json).unwrap();
/// assert_eq!(asset.kind(), ArchiveKind::Tar);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    #[serde(rename = "type")]
    kind: ArchiveKind,
    url: String,
    checksum: Digest,
}

impl AssetDescriptor {
    /// Build a descriptor from its parts.
    #[must_use]
    pub fn new(kind: ArchiveKind, url: impl Into<String>, checksum: Digest) -> Self {
        Self {
            kind,
            url: url.into(),
            checksum,
        }
    }

    /// Archive container format.
    #[must_use]
    pub const fn kind(&self) -> ArchiveKind {
        self.kind
    }

    /// Source URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Expected digest of the downloaded bytes.
    #[must_use]
    pub const fn checksum(&self) -> &Digest {
        &self.checksum
    }
}

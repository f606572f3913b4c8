//! Platform tags of the form `<os>-<arch>`.
//!
//! Tags use registry spellings (`darwin`, `amd64`, `arm64`) rather than
//! Rust's target names, so host detection maps between the two.

use std::fmt;
use std::str::FromStr;

/// Errors raised when parsing a platform tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformTagError {
    /// The tag is not of the form `<os>-<arch>`.
    #[error("invalid platform tag {value:?}: expected <os>-<arch>")]
    Malformed {
        /// The rejected input.
        value: String,
    },
}

/// Operating-system families with distinct launcher and permission rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformFamily {
    /// Executable bits, symlinks, and `#!` scripts.
    Posix,
    /// No executable bit; launchers are `.cmd` and `.ps1` scripts.
    Windows,
}

impl PlatformFamily {
    /// The family this binary was compiled for.
    #[must_use]
    pub const fn host() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }
}

/// An `<os>-<arch>` platform identifier such as `linux-amd64`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlatformTag {
    os: String,
    arch: String,
}

impl PlatformTag {
    /// Build a tag from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformTagError::Malformed`] if either part is empty or
    /// contains `-`, `/`, `\` or whitespace.
    pub fn new(os: &str, arch: &str) -> Result<Self, PlatformTagError> {
        let valid = |part: &str| {
            !part.is_empty()
                && !part
                    .chars()
                    .any(|c| c == '-' || c == '/' || c == '\\' || c.is_whitespace())
        };
        if valid(os) && valid(arch) {
            Ok(Self {
                os: os.to_owned(),
                arch: arch.to_owned(),
            })
        } else {
            Err(PlatformTagError::Malformed {
                value: format!("{os}-{arch}"),
            })
        }
    }

    /// The tag for the running host.
    #[must_use]
    pub fn host() -> Self {
        Self::from_rust_names(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Map Rust's `target_os`/`target_arch` names to registry names.
    #[must_use]
    pub fn from_rust_names(os: &str, arch: &str) -> Self {
        let os = match os {
            "macos" => "darwin",
            other => other,
        };
        let arch = match arch {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            other => other,
        };
        Self {
            os: os.to_owned(),
            arch: arch.to_owned(),
        }
    }

    /// Operating system component.
    #[must_use]
    pub fn os(&self) -> &str {
        &self.os
    }

    /// Architecture component.
    #[must_use]
    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// The family of the tagged operating system.
    #[must_use]
    pub fn family(&self) -> PlatformFamily {
        if self.os == "windows" {
            PlatformFamily::Windows
        } else {
            PlatformFamily::Posix
        }
    }
}

impl fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

impl FromStr for PlatformTag {
    type Err = PlatformTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (os, arch) = s.split_once('-').ok_or_else(|| PlatformTagError::Malformed {
            value: s.to_owned(),
        })?;
        Self::new(os, arch).map_err(|_| PlatformTagError::Malformed {
            value: s.to_owned(),
        })
    }
}

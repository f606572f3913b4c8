//! On-disk layout of a nori root.
//!
//! ```text
//! <root>/
//!   installs/<name>/<version>/<os>-<arch>/   one directory per package key
//!   shims/                                   flat launcher directory
//!   config/settings.toml                     optional settings
//!   config/active.toml                       active version per package
//!   tmp/                                     extraction scratch space
//! ```

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};

use crate::dirs::{BaseDirs, DEFAULT_ROOT_DIR};
use crate::platform::PlatformTag;

/// Errors resolving the root or building package keys.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    /// Neither an explicit root nor a home directory is available.
    #[error("could not determine the nori root: no home directory and NORI_ROOT is unset")]
    NoRoot,

    /// The resolved root is not valid UTF-8.
    #[error("nori root is not valid UTF-8: {path}")]
    NonUtf8Root {
        /// Lossy rendering of the offending path.
        path: String,
    },

    /// A relative root could not be made absolute.
    #[error("could not make nori root {path} absolute: {reason}")]
    RelativeRoot {
        /// The relative root as given.
        path: String,
        /// Why the working directory was unavailable.
        reason: String,
    },

    /// A package name or version cannot be used as a single path segment.
    #[error("invalid package {field} {value:?}: must be a single non-empty path segment")]
    InvalidSegment {
        /// Which key field was rejected.
        field: &'static str,
        /// The rejected value.
        value: String,
    },
}

fn validate_segment(field: &'static str, value: &str) -> Result<String, LayoutError> {
    let invalid = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\'])
        || value.chars().any(char::is_control);
    if invalid {
        Err(LayoutError::InvalidSegment {
            field,
            value: value.to_owned(),
        })
    } else {
        Ok(value.to_owned())
    }
}

/// Identity of one install: package name, version and platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageKey {
    name: String,
    version: String,
    platform: PlatformTag,
}

impl PackageKey {
    /// Build a key, rejecting names and versions that are not plain path
    /// segments.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidSegment`] for empty values, `.`/`..`,
    /// or values containing path separators or control characters.
    pub fn new(name: &str, version: &str, platform: PlatformTag) -> Result<Self, LayoutError> {
        Ok(Self {
            name: validate_segment("name", name)?,
            version: validate_segment("version", version)?,
            platform,
        })
    }

    /// Package name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Package version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Target platform.
    #[must_use]
    pub fn platform(&self) -> &PlatformTag {
        &self.platform
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} ({})", self.name, self.version, self.platform)
    }
}

/// Paths under a nori root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: Utf8PathBuf,
}

impl Layout {
    /// Use `root` as the nori root.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the root from an explicit path, then `NORI_ROOT`, then
    /// `<home>/.nori`. A relative root is anchored at the current working
    /// directory so install paths stay valid as launcher targets.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::NoRoot`] when nothing resolves,
    /// [`LayoutError::RelativeRoot`] when a relative root cannot be
    /// anchored, or [`LayoutError::NonUtf8Root`] when the result is not UTF-8.
    pub fn resolve(explicit: Option<Utf8PathBuf>, dirs: &dyn BaseDirs) -> Result<Self, LayoutError> {
        let root = explicit
            .map(Utf8PathBuf::into_std_path_buf)
            .or_else(|| dirs.root_override())
            .or_else(|| dirs.home_dir().map(|home| home.join(DEFAULT_ROOT_DIR)))
            .ok_or(LayoutError::NoRoot)?;
        let root = std::path::absolute(&root).map_err(|err| LayoutError::RelativeRoot {
            path: root.display().to_string(),
            reason: err.to_string(),
        })?;
        Utf8PathBuf::from_path_buf(root)
            .map(Self::new)
            .map_err(|path| LayoutError::NonUtf8Root {
                path: path.display().to_string(),
            })
    }

    /// The root itself.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Parent of every package's install directories.
    #[must_use]
    pub fn installs_dir(&self) -> Utf8PathBuf {
        self.root.join("installs")
    }

    /// The shared launcher directory.
    #[must_use]
    pub fn shims_dir(&self) -> Utf8PathBuf {
        self.root.join("shims")
    }

    /// Configuration directory.
    #[must_use]
    pub fn config_dir(&self) -> Utf8PathBuf {
        self.root.join("config")
    }

    /// Scratch space for extraction.
    #[must_use]
    pub fn tmp_dir(&self) -> Utf8PathBuf {
        self.root.join("tmp")
    }

    /// `config/settings.toml`.
    #[must_use]
    pub fn settings_path(&self) -> Utf8PathBuf {
        self.config_dir().join("settings.toml")
    }

    /// `config/active.toml`.
    #[must_use]
    pub fn active_path(&self) -> Utf8PathBuf {
        self.config_dir().join("active.toml")
    }

    /// Deterministic install directory for `key`.
    #[must_use]
    pub fn install_path(&self, key: &PackageKey) -> Utf8PathBuf {
        self.installs_dir()
            .join(key.name())
            .join(key.version())
            .join(key.platform().to_string())
    }
}

//! The active version of each package, persisted in `config/active.toml`.

use std::collections::BTreeMap;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// Errors reading or writing the active-versions file.
#[derive(Debug, thiserror::Error)]
pub enum ActiveVersionsError {
    /// The file exists but could not be read.
    #[error("failed to read active versions from {path}")]
    Read {
        /// Path of the file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The file is not valid.
    #[error("invalid active versions file {path}: {source}")]
    Parse {
        /// Path of the file.
        path: Utf8PathBuf,
        /// The parse failure.
        #[source]
        source: toml::de::Error,
    },

    /// The table could not be serialised.
    #[error("failed to serialise active versions: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The file could not be written.
    #[error("failed to write active versions to {path}")]
    Write {
        /// Path of the file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Mapping from package name to its active version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActiveVersions {
    #[serde(default)]
    packages: BTreeMap<String, String>,
}

impl ActiveVersions {
    /// Load the table from `path`; a missing file is an empty table.
    ///
    /// # Errors
    ///
    /// Returns [`ActiveVersionsError`] if the file cannot be read or parsed.
    pub fn load(path: &Utf8Path) -> Result<Self, ActiveVersionsError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ActiveVersionsError::Read {
                    path: path.to_owned(),
                    source,
                });
            }
        };
        toml::from_str(&contents).map_err(|source| ActiveVersionsError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// The active version of `package`, if any.
    #[must_use]
    pub fn get(&self, package: &str) -> Option<&str> {
        self.packages.get(package).map(String::as_str)
    }

    /// Mark `version` active for `package`, returning the previous version.
    pub fn set(&mut self, package: &str, version: &str) -> Option<String> {
        self.packages.insert(package.to_owned(), version.to_owned())
    }

    /// Forget `package`, returning its version if it was active.
    pub fn remove(&mut self, package: &str) -> Option<String> {
        self.packages.remove(package)
    }

    /// Write the table to `path`, replacing any previous file atomically.
    ///
    /// # Errors
    ///
    /// Returns [`ActiveVersionsError`] on serialisation or I/O failure.
    pub fn save(&self, path: &Utf8Path) -> Result<(), ActiveVersionsError> {
        let contents = toml::to_string(self)?;
        let write_err = |source| ActiveVersionsError::Write {
            path: path.to_owned(),
            source,
        };
        let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
        std::fs::create_dir_all(parent).map_err(write_err)?;
        let mut staged = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
        staged.write_all(contents.as_bytes()).map_err(write_err)?;
        staged
            .persist(path)
            .map_err(|err| write_err(err.error))?;
        Ok(())
    }
}

//! Optional settings read from `config/settings.toml`.
//!
//! ```toml
//! [fetch]
//! max_attempts = 3
//! backoff_unit_ms = 1000
//!
//! [extract]
//! temp_in_root = true
//! ```
//!
//! Every field has a default and a missing file yields the defaults.

use std::io;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use crate::artefact::download::{DEFAULT_BACKOFF_UNIT, DEFAULT_MAX_ATTEMPTS, RetryPolicy};

/// Errors loading settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The settings file exists but could not be read.
    #[error("failed to read settings from {path}")]
    Read {
        /// Path of the settings file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The settings file is not valid TOML or has unknown keys.
    #[error("invalid settings in {path}: {source}")]
    Parse {
        /// Path of the settings file.
        path: Utf8PathBuf,
        /// The parse failure.
        #[source]
        source: toml::de::Error,
    },
}

/// Download retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchSettings {
    /// Attempts per download, including the first.
    pub max_attempts: u32,
    /// Backoff unit in milliseconds.
    pub backoff_unit_ms: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_unit_ms: u64::try_from(DEFAULT_BACKOFF_UNIT.as_millis()).unwrap_or(1000),
        }
    }
}

/// Extraction settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractSettings {
    /// Extract under `<root>/tmp` rather than the system temp directory.
    pub temp_in_root: bool,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self { temp_in_root: true }
    }
}

/// All settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// `[fetch]` table.
    pub fetch: FetchSettings,
    /// `[extract]` table.
    pub extract: ExtractSettings,
}

impl Settings {
    /// Load settings from `path`, falling back to defaults when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(path, &contents),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_owned(),
                source,
            }),
        }
    }

    fn parse(path: &Utf8Path, contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// The retry policy described by `[fetch]`.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.fetch.max_attempts,
            Duration::from_millis(self.fetch.backoff_unit_ms),
        )
    }
}

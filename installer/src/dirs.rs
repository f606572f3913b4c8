//! Base directory resolution.
//!
//! The install root defaults to `~/.nori` and can be overridden with the
//! `NORI_ROOT` environment variable. Both lookups sit behind [`BaseDirs`] so
//! tests can substitute fixed paths.

use std::path::PathBuf;

/// Environment variable that overrides the install root.
pub const ROOT_ENV_VAR: &str = "NORI_ROOT";

/// Directory name of the default root under the home directory.
pub const DEFAULT_ROOT_DIR: &str = ".nori";

/// Source of platform base directories.
#[cfg_attr(test, mockall::automock)]
pub trait BaseDirs {
    /// The user's home directory, if it can be determined.
    fn home_dir(&self) -> Option<PathBuf>;

    /// An explicit root taken from the environment, if set and non-empty.
    fn root_override(&self) -> Option<PathBuf>;
}

/// [`BaseDirs`] backed by `directories-next` and the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBaseDirs;

impl BaseDirs for SystemBaseDirs {
    fn home_dir(&self) -> Option<PathBuf> {
        directories_next::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf())
    }

    fn root_override(&self) -> Option<PathBuf> {
        std::env::var_os(ROOT_ENV_VAR)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    }
}

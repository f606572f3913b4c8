//! Installing an extracted package root into its deterministic location.
//!
//! Content is first relocated into a staging directory next to the final
//! install path, executable bits are normalised there, and the staged tree
//! is then swapped into place. A failure at any step leaves the previous
//! install (if any) untouched.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use camino::Utf8PathBuf;
use log::{debug, info, warn};

use crate::artefact::cancel::{Cancelled, CancellationToken};
use crate::layout::{Layout, PackageKey};
use crate::platform::PlatformFamily;

/// Errors raised by [`Installer::install`].
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// A declared binary is absent from the package root.
    #[error("required binary {path} not found in package")]
    MissingBinary {
        /// The declared relative path.
        path: String,
    },

    /// A declared binary path is absolute or climbs out of the package.
    #[error("invalid binary path {path}: must be relative and stay inside the package")]
    InvalidBinaryPath {
        /// The declared path.
        path: String,
    },

    /// The install directory's parent or staging area could not be created.
    #[error("failed to prepare {path}")]
    Prepare {
        /// Directory being prepared.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Every relocation strategy failed for an entry.
    #[error("failed to move {from} to {to}")]
    RelocationFailed {
        /// Source path.
        from: PathBuf,
        /// Destination path.
        to: PathBuf,
        /// The last strategy's error.
        #[source]
        source: io::Error,
    },

    /// Executable permissions could not be applied.
    #[error("failed to mark {path} executable")]
    Permissions {
        /// The binary path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Cancellation was requested.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// One way of moving a file tree to a new location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationStrategy {
    /// Atomic rename; fails across volumes.
    Rename,
    /// Recursive copy preserving modes and symlinks, then delete the source.
    CopyThenRemove,
}

/// Strategies tried in order when relocating an entry.
pub const DEFAULT_RELOCATION: [RelocationStrategy; 2] =
    [RelocationStrategy::Rename, RelocationStrategy::CopyThenRemove];

impl RelocationStrategy {
    /// Move `from` to `to`, which must not exist yet.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised by this strategy.
    pub fn relocate(self, from: &Path, to: &Path) -> io::Result<()> {
        match self {
            Self::Rename => fs::rename(from, to),
            Self::CopyThenRemove => {
                copy_tree(from, to)?;
                remove_tree(from)
            }
        }
    }
}

/// Move `from` to `to` with the first strategy that succeeds.
fn relocate(
    strategies: &[RelocationStrategy],
    from: &Path,
    to: &Path,
) -> Result<(), InstallError> {
    let mut last_error = io::Error::other("no relocation strategy configured");
    for strategy in strategies {
        match strategy.relocate(from, to) {
            Ok(()) => return Ok(()),
            Err(err) => {
                warn!(
                    "{strategy:?} failed for {} -> {}: {err}",
                    from.display(),
                    to.display()
                );
                // A failed copy may leave a partial destination behind.
                if fs::symlink_metadata(to).is_ok() && fs::symlink_metadata(from).is_ok() {
                    if let Err(cleanup) = remove_tree(to) {
                        warn!("failed to clear partial copy {}: {cleanup}", to.display());
                    }
                }
                last_error = err;
            }
        }
    }
    Err(InstallError::RelocationFailed {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source: last_error,
    })
}

fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(from)?;
    let file_type = meta.file_type();
    if file_type.is_symlink() {
        copy_symlink(from, to)
    } else if file_type.is_dir() {
        fs::create_dir(to)?;
        for entry in fs::read_dir(from)? {
            let entry = entry?;
            copy_tree(&entry.path(), &to.join(entry.file_name()))?;
        }
        fs::set_permissions(to, meta.permissions())
    } else {
        fs::copy(from, to)?;
        fs::set_permissions(to, meta.permissions())
    }
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(from)?, to)
}

#[cfg(windows)]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    let target = fs::read_link(from)?;
    if fs::metadata(from).is_ok_and(|meta| meta.is_dir()) {
        std::os::windows::fs::symlink_dir(target, to)
    } else {
        std::os::windows::fs::symlink_file(target, to)
    }
}

#[cfg(not(any(unix, windows)))]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to).map(|_| ())
}

fn remove_tree(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Find a declared binary under `base`, returning its path relative to
/// `base`.
///
/// On Windows a name without an extension also matches `<name>.exe`.
#[must_use]
pub fn resolve_binary(base: &Path, declared: &str, family: PlatformFamily) -> Option<PathBuf> {
    let relative = PathBuf::from(declared);
    if base.join(&relative).is_file() {
        return Some(relative);
    }
    if family == PlatformFamily::Windows && relative.extension().is_none() {
        let with_exe = relative.with_extension("exe");
        if base.join(&with_exe).is_file() {
            return Some(with_exe);
        }
    }
    None
}

fn is_contained_relative(declared: &str) -> bool {
    let path = Path::new(declared);
    path.components().next().is_some()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Relocates package roots into a [`Layout`]'s install tree.
#[derive(Debug, Clone)]
pub struct Installer {
    layout: Layout,
    strategies: Vec<RelocationStrategy>,
    family: PlatformFamily,
    cancel: CancellationToken,
}

impl Installer {
    /// An installer for `layout` using the default strategies and the host
    /// platform family.
    #[must_use]
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            strategies: DEFAULT_RELOCATION.to_vec(),
            family: PlatformFamily::host(),
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the ordered relocation strategies.
    #[must_use]
    pub fn with_strategies(mut self, strategies: Vec<RelocationStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Apply another platform family's binary naming rules.
    #[must_use]
    pub fn with_family(mut self, family: PlatformFamily) -> Self {
        self.family = family;
        self
    }

    /// Abort between relocated entries once `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The layout installs are written into.
    #[must_use]
    pub const fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Install `package_root` as `key`, requiring each of `binaries`.
    ///
    /// Every binary is checked before anything is written. The content is
    /// staged beside the install path and swapped in at the end, replacing
    /// any previous install of the same key wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::MissingBinary`] without touching the install
    /// tree, or another [`InstallError`] after removing the staged content.
    pub fn install(
        &self,
        binaries: &[String],
        key: &PackageKey,
        package_root: &Path,
    ) -> Result<Utf8PathBuf, InstallError> {
        let resolved = self.resolve_all(binaries, package_root)?;
        let target = self.layout.install_path(key);
        let target_std = target.as_std_path();
        let parent = target_std.parent().unwrap_or(target_std);
        fs::create_dir_all(parent).map_err(|source| InstallError::Prepare {
            path: parent.to_path_buf(),
            source,
        })?;

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(parent)
            .map_err(|source| InstallError::Prepare {
                path: parent.to_path_buf(),
                source,
            })?;
        let staged = staging.path().join("tree");
        fs::create_dir(&staged).map_err(|source| InstallError::Prepare {
            path: staged.clone(),
            source,
        })?;

        self.relocate_contents(package_root, &staged)?;
        self.normalise_permissions(&staged, &resolved)?;
        swap_into_place(parent, &staged, target_std)?;

        info!("installed {key} to {target}");
        Ok(target)
    }

    fn resolve_all(
        &self,
        binaries: &[String],
        package_root: &Path,
    ) -> Result<Vec<PathBuf>, InstallError> {
        binaries
            .iter()
            .map(|declared| {
                if !is_contained_relative(declared) {
                    return Err(InstallError::InvalidBinaryPath {
                        path: declared.clone(),
                    });
                }
                resolve_binary(package_root, declared, self.family).ok_or_else(|| {
                    InstallError::MissingBinary {
                        path: declared.clone(),
                    }
                })
            })
            .collect()
    }

    fn relocate_contents(&self, from: &Path, to: &Path) -> Result<(), InstallError> {
        let entries = fs::read_dir(from).map_err(|source| InstallError::Prepare {
            path: from.to_path_buf(),
            source,
        })?;
        for entry in entries {
            self.cancel.check()?;
            let entry = entry.map_err(|source| InstallError::Prepare {
                path: from.to_path_buf(),
                source,
            })?;
            let dest = to.join(entry.file_name());
            debug!("relocating {} -> {}", entry.path().display(), dest.display());
            relocate(&self.strategies, &entry.path(), &dest)?;
        }
        Ok(())
    }

    #[cfg(unix)]
    fn normalise_permissions(&self, staged: &Path, binaries: &[PathBuf]) -> Result<(), InstallError> {
        use std::os::unix::fs::PermissionsExt;

        if self.family != PlatformFamily::Posix {
            return Ok(());
        }
        for binary in binaries {
            let path = staged.join(binary);
            let perm_err = |source| InstallError::Permissions {
                path: path.clone(),
                source,
            };
            let mode = fs::metadata(&path).map_err(perm_err)?.permissions().mode();
            if mode & 0o111 != 0o111 {
                debug!("adding executable bits to {}", path.display());
                fs::set_permissions(&path, fs::Permissions::from_mode(mode | 0o111))
                    .map_err(perm_err)?;
            }
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn normalise_permissions(&self, _staged: &Path, _binaries: &[PathBuf]) -> Result<(), InstallError> {
        Ok(())
    }
}

/// Replace `target` with `staged`, keeping the previous tree until the new
/// one is in place.
fn swap_into_place(parent: &Path, staged: &Path, target: &Path) -> Result<(), InstallError> {
    let relocation_failed = |source| InstallError::RelocationFailed {
        from: staged.to_path_buf(),
        to: target.to_path_buf(),
        source,
    };

    if fs::symlink_metadata(target).is_err() {
        return fs::rename(staged, target).map_err(relocation_failed);
    }

    let backup_dir = tempfile::Builder::new()
        .prefix(".previous-")
        .tempdir_in(parent)
        .map_err(|source| InstallError::Prepare {
            path: parent.to_path_buf(),
            source,
        })?;
    let backup = backup_dir.path().join("tree");
    fs::rename(target, &backup).map_err(|source| InstallError::RelocationFailed {
        from: target.to_path_buf(),
        to: backup.clone(),
        source,
    })?;

    if let Err(source) = fs::rename(staged, target) {
        if let Err(restore) = fs::rename(&backup, target) {
            warn!(
                "could not restore previous install at {}: {restore}",
                target.display()
            );
        }
        return Err(relocation_failed(source));
    }

    debug!("replaced previous install at {}", target.display());
    if let Err(err) = backup_dir.close() {
        warn!("failed to remove previous install: {err}");
    }
    Ok(())
}

#[cfg(test)]
#[path = "install_tests.rs"]
mod tests;

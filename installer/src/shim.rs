//! Launchers ("shims") in the shared shims directory.
//!
//! Each declared binary gets a launcher named after its base name that
//! forwards arguments and exit status to the active install. Launchers are
//! produced by the first [`LauncherStrategy`] that succeeds; publishing
//! the same name again replaces the previous launcher atomically.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::install::resolve_binary;
use crate::platform::PlatformFamily;

/// Errors raised while publishing or removing launchers.
#[derive(Debug, thiserror::Error)]
pub enum ShimError {
    /// The launcher target does not exist.
    #[error("shim target for {binary} not found at {path}")]
    TargetMissing {
        /// Binary the launcher was requested for.
        binary: String,
        /// Expected target path.
        path: PathBuf,
    },

    /// The binary name cannot be used as a launcher file name.
    #[error("invalid shim name {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// No strategy could write the launcher.
    #[error("failed to write shim {path}")]
    WriteFailed {
        /// The launcher path.
        path: PathBuf,
        /// The last strategy's error.
        #[source]
        source: io::Error,
    },
}

/// Mechanisms for producing a launcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LauncherStrategy {
    /// A symbolic link to the target.
    Symlink,
    /// A `#!/bin/sh` script that `exec`s the target.
    PosixScript,
    /// A `.cmd` and a `.ps1` script side by side.
    WindowsScripts,
}

impl LauncherStrategy {
    /// Preferred strategies for a platform family, in order.
    #[must_use]
    pub fn defaults_for(family: PlatformFamily) -> Vec<Self> {
        match family {
            PlatformFamily::Posix => vec![Self::Symlink, Self::PosixScript],
            PlatformFamily::Windows => vec![Self::WindowsScripts],
        }
    }

    /// Launcher file names this strategy writes for `name`.
    #[must_use]
    pub fn file_names(self, name: &str) -> Vec<String> {
        match self {
            Self::Symlink | Self::PosixScript => vec![name.to_owned()],
            Self::WindowsScripts => vec![format!("{name}.cmd"), format!("{name}.ps1")],
        }
    }

    fn write(self, dir: &Path, name: &str, target: &Path) -> io::Result<Vec<PathBuf>> {
        match self {
            Self::Symlink => {
                let dest = dir.join(name);
                replace_with_symlink(dir, &dest, target)?;
                Ok(vec![dest])
            }
            Self::PosixScript => {
                let dest = dir.join(name);
                replace_with_script(dir, &dest, &posix_script(target), true)?;
                Ok(vec![dest])
            }
            Self::WindowsScripts => {
                let cmd = dir.join(format!("{name}.cmd"));
                let ps1 = dir.join(format!("{name}.ps1"));
                replace_with_script(dir, &cmd, &cmd_script(target), false)?;
                replace_with_script(dir, &ps1, &powershell_script(target), false)?;
                Ok(vec![cmd, ps1])
            }
        }
    }
}

/// Shell script that replaces itself with `target`.
#[must_use]
pub fn posix_script(target: &Path) -> String {
    let quoted = target.display().to_string().replace('\'', r"'\''");
    format!("#!/bin/sh\nexec '{quoted}' \"$@\"\n")
}

/// Batch file that runs `target` and propagates its exit code.
#[must_use]
pub fn cmd_script(target: &Path) -> String {
    format!(
        "@echo off\r\n\"{}\" %*\r\nexit /b %ERRORLEVEL%\r\n",
        target.display()
    )
}

/// PowerShell script that runs `target` and propagates its exit code.
#[must_use]
pub fn powershell_script(target: &Path) -> String {
    let quoted = target.display().to_string().replace('\'', "''");
    format!("& '{quoted}' @args\r\nexit $LASTEXITCODE\r\n")
}

fn staging_name(dir: &Path, dest: &Path) -> PathBuf {
    let base = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dir.join(format!(".{base}.{}.tmp", std::process::id()))
}

fn replace_with_symlink(dir: &Path, dest: &Path, target: &Path) -> io::Result<()> {
    let staged = staging_name(dir, dest);
    match fs::remove_file(&staged) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    create_symlink(target, &staged)?;
    fs::rename(&staged, dest).inspect_err(|_| {
        if let Err(err) = fs::remove_file(&staged) {
            debug!("leaving stale launcher {}: {err}", staged.display());
        }
    })
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(not(any(unix, windows)))]
fn create_symlink(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks are not supported on this platform",
    ))
}

fn replace_with_script(dir: &Path, dest: &Path, contents: &str, executable: bool) -> io::Result<()> {
    let mut staged = tempfile::Builder::new().prefix(".shim-").tempfile_in(dir)?;
    staged.write_all(contents.as_bytes())?;
    if executable {
        make_executable(staged.path())?;
    }
    staged.persist(dest).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// A launcher that was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedShim {
    /// Launcher name.
    pub name: String,
    /// Strategy that produced it.
    pub strategy: LauncherStrategy,
    /// Files written in the shims directory.
    pub paths: Vec<PathBuf>,
}

/// Publishes and removes launchers in one shims directory.
#[derive(Debug, Clone)]
pub struct ShimManager {
    shims_dir: PathBuf,
    strategies: Vec<LauncherStrategy>,
    family: PlatformFamily,
}

impl ShimManager {
    /// A manager for `shims_dir` using the host's default strategies.
    #[must_use]
    pub fn new(shims_dir: impl Into<PathBuf>) -> Self {
        let family = PlatformFamily::host();
        Self {
            shims_dir: shims_dir.into(),
            strategies: LauncherStrategy::defaults_for(family),
            family,
        }
    }

    /// Use another platform family's naming rules and default strategies.
    #[must_use]
    pub fn with_family(mut self, family: PlatformFamily) -> Self {
        self.family = family;
        self.strategies = LauncherStrategy::defaults_for(family);
        self
    }

    /// Replace the ordered strategy list.
    #[must_use]
    pub fn with_strategies(mut self, strategies: Vec<LauncherStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    /// The shims directory.
    #[must_use]
    pub fn shims_dir(&self) -> &Path {
        &self.shims_dir
    }

    /// Create or overwrite the launcher `binary_name` pointing at `target`.
    ///
    /// A relative `target` is made absolute against the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ShimError::TargetMissing`] if `target` is not a file,
    /// [`ShimError::InvalidName`] for names containing path separators, and
    /// [`ShimError::WriteFailed`] when every strategy fails.
    pub fn publish(&self, binary_name: &str, target: &Path) -> Result<PublishedShim, ShimError> {
        validate_name(binary_name)?;
        let write_failed = |source| ShimError::WriteFailed {
            path: self.shims_dir.join(binary_name),
            source,
        };
        // Launchers are resolved from the shims dir or the caller's cwd.
        let target = std::path::absolute(target).map_err(write_failed)?;
        if !target.is_file() {
            return Err(ShimError::TargetMissing {
                binary: binary_name.to_owned(),
                path: target,
            });
        }
        fs::create_dir_all(&self.shims_dir).map_err(write_failed)?;

        let mut last_error = io::Error::other("no launcher strategy configured");
        for &strategy in &self.strategies {
            match strategy.write(&self.shims_dir, binary_name, &target) {
                Ok(paths) => {
                    debug!("published {binary_name} -> {} ({strategy:?})", target.display());
                    return Ok(PublishedShim {
                        name: binary_name.to_owned(),
                        strategy,
                        paths,
                    });
                }
                Err(err) => {
                    warn!("{strategy:?} launcher for {binary_name} failed: {err}");
                    last_error = err;
                }
            }
        }
        Err(write_failed(last_error))
    }

    /// Publish a launcher for every declared binary of an install.
    ///
    /// Launchers are named after each binary's base name (without `.exe`
    /// on Windows).
    ///
    /// # Errors
    ///
    /// Stops at the first binary that fails; see [`Self::publish`].
    pub fn sync_all(
        &self,
        binaries: &[String],
        install_path: &Path,
    ) -> Result<Vec<PublishedShim>, ShimError> {
        binaries
            .iter()
            .map(|declared| {
                let relative = resolve_binary(install_path, declared, self.family).ok_or_else(
                    || ShimError::TargetMissing {
                        binary: declared.clone(),
                        path: install_path.join(declared),
                    },
                )?;
                let name = self.launcher_name(&relative).ok_or_else(|| ShimError::InvalidName {
                    name: declared.clone(),
                })?;
                self.publish(&name, &install_path.join(relative))
            })
            .collect()
    }

    /// Delete every launcher file for `names`, returning how many were
    /// removed. Absent launchers are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ShimError::WriteFailed`] if an existing launcher cannot be
    /// deleted.
    pub fn remove(&self, names: &[String]) -> Result<usize, ShimError> {
        let mut removed = 0;
        for name in names {
            validate_name(name)?;
            let candidates = [
                LauncherStrategy::PosixScript,
                LauncherStrategy::WindowsScripts,
            ]
            .into_iter()
            .flat_map(|strategy| strategy.file_names(name));
            for file_name in candidates {
                let path = self.shims_dir.join(file_name);
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                    Err(source) => return Err(ShimError::WriteFailed { path, source }),
                }
            }
        }
        Ok(removed)
    }

    /// Launcher names for declared binary paths.
    ///
    /// # Errors
    ///
    /// Returns [`ShimError::InvalidName`] for a path with no file name.
    pub fn launcher_names(&self, binaries: &[String]) -> Result<Vec<String>, ShimError> {
        binaries
            .iter()
            .map(|declared| {
                self.launcher_name(Path::new(declared))
                    .ok_or_else(|| ShimError::InvalidName {
                        name: declared.clone(),
                    })
            })
            .collect()
    }

    fn launcher_name(&self, relative: &Path) -> Option<String> {
        let strip_exe = self.family == PlatformFamily::Windows
            && relative
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("exe"));
        let name = if strip_exe {
            relative.file_stem()
        } else {
            relative.file_name()
        }?;
        Some(name.to_string_lossy().into_owned())
    }
}

fn validate_name(name: &str) -> Result<(), ShimError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        Err(ShimError::InvalidName {
            name: name.to_owned(),
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
#[path = "shim_tests.rs"]
mod tests;

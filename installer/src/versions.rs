//! Switching between and listing installed versions.
//!
//! Activation is the only place launchers are published: the shims always
//! point at the version recorded in `config/active.toml`.

use std::io;

use camino::Utf8Path;
use log::debug;

use crate::active::ActiveVersions;
use crate::error::{PipelineError, Result};
use crate::layout::{Layout, PackageKey};
use crate::platform::PlatformTag;
use crate::shim::{PublishedShim, ShimManager};

/// One installed version of a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledVersion {
    /// Version directory name.
    pub version: String,
    /// Whether this is the recorded active version.
    pub active: bool,
}

/// Make an existing install the active version of its package.
///
/// Launchers for `binaries` are republished against the install before the
/// active version is recorded.
///
/// # Errors
///
/// Returns [`PipelineError::NotInstalled`] when the install directory is
/// absent, or the shim or active-versions failure otherwise.
pub fn activate(
    layout: &Layout,
    key: &PackageKey,
    binaries: &[String],
) -> Result<Vec<PublishedShim>> {
    let install_path = layout.install_path(key);
    if !install_path.is_dir() {
        return Err(PipelineError::NotInstalled {
            package: key.to_string(),
        });
    }
    let shims =
        ShimManager::new(layout.shims_dir()).sync_all(binaries, install_path.as_std_path())?;

    let active_path = layout.active_path();
    let mut active = ActiveVersions::load(&active_path)?;
    if let Some(previous) = active.set(key.name(), key.version()) {
        debug!("{} was active at {previous}", key.name());
    }
    active.save(&active_path)?;
    Ok(shims)
}

/// Remove the launchers for `binaries` and forget the active version of
/// `name`. Installs are left in place. Returns the previously active
/// version, if any.
///
/// # Errors
///
/// Returns the shim removal or active-versions failure.
pub fn deactivate(layout: &Layout, name: &str, binaries: &[String]) -> Result<Option<String>> {
    let shims = ShimManager::new(layout.shims_dir());
    let removed = shims.remove(&shims.launcher_names(binaries)?)?;
    debug!("removed {removed} launcher files for {name}");

    let active_path = layout.active_path();
    let mut active = ActiveVersions::load(&active_path)?;
    let previous = active.remove(name);
    if previous.is_some() {
        active.save(&active_path)?;
    }
    Ok(previous)
}

/// Names of every package with an installs directory, sorted.
///
/// # Errors
///
/// Returns [`PipelineError::ReadFile`] if the installs directory exists but
/// cannot be read.
pub fn installed_packages(layout: &Layout) -> Result<Vec<String>> {
    visible_dirs(&layout.installs_dir())
}

/// Installed versions of `name` for `platform`, sorted, with the active
/// one marked.
///
/// # Errors
///
/// Returns [`PipelineError::ReadFile`] for unreadable directories, or the
/// active-versions load failure.
pub fn installed_versions(
    layout: &Layout,
    name: &str,
    platform: &PlatformTag,
) -> Result<Vec<InstalledVersion>> {
    let active = ActiveVersions::load(&layout.active_path())?;
    let package_dir = layout.installs_dir().join(name);
    let platform_dir = platform.to_string();
    Ok(visible_dirs(&package_dir)?
        .into_iter()
        .filter(|version| package_dir.join(version).join(&platform_dir).is_dir())
        .map(|version| InstalledVersion {
            active: active.get(name) == Some(version.as_str()),
            version,
        })
        .collect())
}

fn visible_dirs(dir: &Utf8Path) -> Result<Vec<String>> {
    let read_err = |source| PipelineError::ReadFile {
        path: dir.as_std_path().to_path_buf(),
        source,
    };
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(read_err(err)),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(read_err)?;
        if !entry.file_type().map_err(read_err)?.is_dir() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if !name.starts_with('.') {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
